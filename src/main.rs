use chrono::Utc;
use clap::Parser;
use flash_form::utils::{logger, validation::Validate};
use flash_form::{
    CliConfig, FormError, FormsConfig, Outcome, RawFormData, RequestContext, SubmissionPipeline,
};

fn fail(e: &FormError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        flash_form::utils::error::ErrorSeverity::Low => 0,
        flash_form::utils::error::ErrorSeverity::Medium => 2,
        flash_form::utils::error::ErrorSeverity::High => 1,
        flash_form::utils::error::ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn load_payload(args: &CliConfig) -> Result<RawFormData, FormError> {
    if let Some(path) = &args.payload {
        let content = std::fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        return RawFormData::from_json(&json);
    }

    if let Some(body) = &args.urlencoded {
        return Ok(RawFormData::from_urlencoded(body));
    }

    Ok(RawFormData::default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::debug!("CLI config: {:?}", args);
    tracing::info!("📁 Loading forms configuration from: {}", args.config);

    let config = FormsConfig::from_file(&args.config).unwrap_or_else(|e| fail(&e));
    if let Err(e) = config.validate() {
        fail(&e);
    }

    if args.issue_nonce {
        println!("{}", config.nonce_verifier().issue(&args.form_id));
        return Ok(());
    }

    let raw = load_payload(&args).unwrap_or_else(|e| fail(&e));

    let mut ctx = RequestContext::new(Utc::now())
        .with_remote_addr(args.remote_addr.clone())
        .authenticated(args.authenticated);
    ctx.x_forwarded_for = args.x_forwarded_for.clone();

    let mut pipeline =
        SubmissionPipeline::new(config.site.clone(), config.gate_chain(), config.notification_sink());
    if let Some(archiver) = config.archiver() {
        pipeline = pipeline.with_archiver(archiver);
    }

    let outcome = pipeline
        .process_by_id(&config, &args.form_id, &ctx, &raw)
        .await;

    if args.async_response {
        println!("{}", serde_json::to_string_pretty(&outcome.to_async_json())?);
        return Ok(());
    }

    match outcome {
        Outcome::Content(html) => println!("{}", html),
        Outcome::Redirect(url) => println!("Location: {}", url),
        Outcome::Unauthorized => {
            eprintln!("🔒 Submission rejected: missing or invalid form token");
            std::process::exit(4);
        }
    }

    Ok(())
}
