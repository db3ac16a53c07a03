//! Command handlers
//!
//! Results go to stdout; progress and diagnostics go through `tracing`.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use sdcli_common::time::{now, resolve_window};

use crate::cli::{
    Command, CreditUsageArgs, ListLatestModelsArgs, ModelAccessDataArgs, ModelIdArgs, NotifyUsersArgs,
    ParseSdtfArgs, SdtfExampleArgs, SessionAnalyticsArgs, UploadModelArgs,
};
use crate::context::CliContext;
use crate::error::{CliError, CliResult};
use crate::models::{CreditUsage, GeometrySessionView, UsageGranularity};
use crate::sdtf::{make_example_sdtf, ExampleChunk, SdtfAsset};
use crate::services::{
    build_http_client, fetch_session_analytics, notify_users, query_user_credit_usage,
    run_customization_using_sdtf, ChunkMatcher, GeometryBackend, GeometryConnector, NotificationOptions,
    NotifyUsersOptions, PlatformBackend, PublicationOutcome, PublicationWorkflow, SdtfInput,
};

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::Parse(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Dispatch an authenticated command
pub async fn run(ctx: &CliContext, command: Command) -> CliResult<()> {
    match command {
        Command::ModelAccessData(args) => model_access_data(ctx, &args).await,
        Command::ListLatestModels(args) => list_latest_models(ctx, &args).await,
        Command::ModelInfoPlatform(args) => model_info_platform(ctx, &args).await,
        Command::ModelInfoGeometry(args) => model_info_geometry(ctx, &args).await,
        Command::UploadModel(args) => upload_model(ctx, &args).await,
        Command::PublishModel(args) => publish_model(ctx, &args).await,
        Command::CreditUsage(args) => credit_usage(ctx, &args).await,
        Command::SdtfExample(args) => sdtf_example(ctx, &args).await,
        Command::ParseSdtf(args) => parse_sdtf(&args).await,
        Command::NotifyUsers(args) => notify(ctx, &args).await,
        Command::SessionAnalytics(args) => session_analytics(ctx, &args).await,
    }
}

async fn model_access_data(ctx: &CliContext, args: &ModelAccessDataArgs) -> CliResult<()> {
    let data = ctx
        .platform
        .get_model_access_data(&args.id, args.allow_exports, args.backend)
        .await?;
    print_json(&data.access_data)
}

async fn list_latest_models(ctx: &CliContext, args: &ListLatestModelsArgs) -> CliResult<()> {
    let models = ctx.platform.list_latest_models(args.limit, args.own).await?;
    for model in &models {
        println!(
            "{}  {}  {}  {}",
            model.created_at.as_deref().unwrap_or("-"),
            model.id,
            model.slug.as_deref().unwrap_or("-"),
            model.title.as_deref().unwrap_or("")
        );
    }
    info!(count = models.len(), "Listed models");
    Ok(())
}

async fn model_info_platform(ctx: &CliContext, args: &ModelIdArgs) -> CliResult<()> {
    let model = ctx.platform.get_model_info(&args.id).await?;
    print_json(&model)
}

/// Run `body` against a fresh session and close the session afterwards,
/// also when `body` failed
async fn with_session<G, F, Fut, T>(geometry: &G, ticket: &str, body: F) -> CliResult<T>
where
    G: GeometryBackend + ?Sized,
    F: FnOnce(GeometrySessionView) -> Fut,
    Fut: std::future::Future<Output = CliResult<T>>,
{
    let session = geometry.init_session(ticket).await?;
    let session_id = session.session_id.clone();

    let result = body(session).await;

    if let Err(e) = geometry.close_session(&session_id).await {
        warn!(session_id = %session_id, error = %e, "Failed to close session");
        if result.is_ok() {
            return Err(e);
        }
    }
    result
}

fn require_ticket(model_id: &str, ticket: Option<String>) -> CliResult<String> {
    ticket.ok_or_else(|| {
        CliError::InvalidParameter(format!(
            "Model {} has no backend ticket, it may not be published yet",
            model_id
        ))
    })
}

async fn model_info_geometry(ctx: &CliContext, args: &ModelIdArgs) -> CliResult<()> {
    let data = ctx.platform.get_model_access_data(&args.id, false, true).await?;
    let ticket = require_ticket(&data.model.id, data.access_data.ticket.clone())?;
    let geometry = ctx.connect(&data.access_data)?;

    with_session(&geometry, &ticket, |session| async move {
        println!("Parameters:");
        for p in &session.parameters {
            println!("  {}  {}  ({})", p.id, p.name, p.param_type.as_str());
        }
        println!("Outputs:");
        for o in &session.outputs {
            println!("  {}  {}", o.id, o.name);
        }
        println!("Exports:");
        for e in &session.exports {
            println!("  {}  {}", e.id, e.name);
        }
        Ok(())
    })
    .await
}

/// Non-published outcomes are reported, not failed: the model exists and
/// `publish-model` can pick it up later
fn report_outcome(outcome: &PublicationOutcome) -> CliResult<()> {
    println!("{}", outcome.describe());
    if !outcome.is_published() {
        warn!(model_id = %outcome.model_id(), "Model was not published");
    }
    Ok(())
}

async fn upload_model(ctx: &CliContext, args: &UploadModelArgs) -> CliResult<()> {
    let workflow = PublicationWorkflow::new(&ctx.platform, ctx, ctx.poll_config());
    let outcome = workflow
        .create_and_upload_model(&args.filename, args.title.as_deref())
        .await?;
    report_outcome(&outcome)
}

async fn publish_model(ctx: &CliContext, args: &ModelIdArgs) -> CliResult<()> {
    let workflow = PublicationWorkflow::new(&ctx.platform, ctx, ctx.poll_config());
    let outcome = workflow.publish_model(&args.id).await?;
    report_outcome(&outcome)
}

fn print_credit_usage(rows: &[CreditUsage]) {
    println!("{:<10} {:>10} {:>10} {:>14}", "timestamp", "sessions", "exports", "computations");
    for row in rows {
        println!(
            "{:<10} {:>10} {:>10} {:>14}",
            row.timestamp, row.sessions, row.exports, row.computations
        );
    }
}

async fn credit_usage(ctx: &CliContext, args: &CreditUsageArgs) -> CliResult<()> {
    let (from, to) = resolve_window(now().date_naive(), args.days, args.from.as_deref(), args.to.as_deref())?;
    let user_id = match &args.user_id {
        Some(id) => id.clone(),
        None => ctx.platform.authenticated_user_id().to_string(),
    };

    let rows = query_user_credit_usage(&ctx.platform, &user_id, from, to, UsageGranularity::Day).await?;
    print_credit_usage(&rows);
    Ok(())
}

async fn read_input_file(path: &Path) -> CliResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| CliError::FileAccess {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

async fn sdtf_example(ctx: &CliContext, args: &SdtfExampleArgs) -> CliResult<()> {
    let bytes = match &args.filename {
        Some(path) => read_input_file(path).await?,
        None => make_example_sdtf(&ExampleChunk::ALL)?,
    };
    if let Some(path) = &args.save {
        tokio::fs::write(path, &bytes).await.map_err(|e| CliError::FileAccess {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!(path = %path.display(), "Saved sdTF container");
    }

    let input = SdtfInput::from_bytes(bytes)?;
    for chunk in &input.chunks {
        println!(
            "Chunk {} ({}): {} items",
            chunk.friendly_name.as_deref().unwrap_or(&chunk.id),
            chunk.type_hint.as_deref().unwrap_or("no type hint"),
            chunk.item_count
        );
    }

    let data = ctx.platform.get_model_access_data(&args.id, false, true).await?;
    let ticket = require_ticket(&data.model.id, data.access_data.ticket.clone())?;
    let geometry = ctx.connect(&data.access_data)?;

    with_session(&geometry, &ticket, |session| {
        let geometry = &geometry;
        async move {
            let outcome = ChunkMatcher::new().match_chunks(std::slice::from_ref(&input), &session.parameters);
            if outcome.bindings.is_empty() {
                println!("No chunk matched a parameter of the model, nothing to customize");
                return Ok(());
            }
            for binding in &outcome.bindings {
                println!("Chunk {} -> parameter {}", binding.chunk_id, binding.parameter_id);
            }

            let values = outcome.into_parameter_values();
            let result = run_customization_using_sdtf(geometry, &session, &values, None).await?;

            println!("Request body:");
            print_json(&Value::Object(result.request_body))?;
            println!("Outputs:");
            for output in &result.outputs {
                println!("  {}  {}  {} content items", output.id, output.name, output.content.len());
            }
            Ok(())
        }
    })
    .await
}

/// Print the chunks of a container read from a path or URL
pub async fn parse_sdtf(args: &ParseSdtfArgs) -> CliResult<()> {
    let source = args.filename.as_str();
    let asset = if source.starts_with("http://") || source.starts_with("https://") {
        let http = build_http_client()?;
        SdtfAsset::read_from_url(&http, source).await?
    } else {
        SdtfAsset::read_from_file(Path::new(source)).await?
    };

    println!("Generator: {}", asset.generator);
    println!("Chunks: {}", asset.chunks.len());
    for (index, chunk) in asset.chunks.iter().enumerate() {
        println!(
            "Chunk {} name: {}, type hint: {}",
            index,
            chunk.name.as_deref().unwrap_or("-"),
            chunk.type_hint.as_deref().unwrap_or("-")
        );
        for (key, value) in &chunk.attributes {
            println!("  attribute {}: {}", key, value);
        }
        for branch in &chunk.branches {
            println!("  branch {}: {} items", branch.name, branch.item_count);
        }
    }
    Ok(())
}

async fn notify(ctx: &CliContext, args: &NotifyUsersArgs) -> CliResult<()> {
    let options = NotifyUsersOptions {
        plan_name: args.plan_name.clone(),
        plan_name_exact: args.plan_name_exact.clone(),
        features_true: args.features_true.clone(),
        features_false: args.features_false.clone(),
        organization_filter: args.organization.into(),
        organization_roles: args.roles.clone(),
        dry_run: args.dry_run,
        offset: args.offset.clone(),
    };
    let notification = NotificationOptions {
        notification_type: args.notification_type.clone(),
        description: args.description.clone(),
        href: args.href.clone(),
    };

    let users = notify_users(&ctx.platform, &options, &notification).await?;
    for user in &users {
        println!(
            "{}  {}  {}",
            user.id,
            user.username.as_deref().unwrap_or("-"),
            user.email.as_deref().unwrap_or("-")
        );
    }
    let verb = if args.dry_run { "Matched" } else { "Notified" };
    println!("{} {} users", verb, users.len());
    Ok(())
}

async fn session_analytics(ctx: &CliContext, args: &SessionAnalyticsArgs) -> CliResult<()> {
    let (from, to) = resolve_window(now().date_naive(), args.days, args.from.as_deref(), args.to.as_deref())?;

    let filters: Vec<(String, Value)> = if args.filters.is_empty() {
        vec![(
            "user_id[=]".to_string(),
            Value::from(ctx.platform.authenticated_user_id()),
        )]
    } else {
        args.filters
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.as_str())))
            .collect()
    };

    let report = fetch_session_analytics(&ctx.platform, ctx, &filters, &from.to_string(), &to.to_string()).await?;
    print_json(&report.entries)?;
    if !report.skipped.is_empty() {
        println!("Skipped models: {}", report.skipped.join(", "));
    }
    Ok(())
}
