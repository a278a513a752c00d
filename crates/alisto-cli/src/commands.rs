use std::io::{self, Write};

use anyhow::{bail, Context as _, Result};
use chrono::Local;
use serde_json::Value;
use tracing::{debug, warn};

use alisto_core::auth::SessionData;
use alisto_core::models::{NewsCategory, NewsFilter, ProjectFilter, TouristSpotQuery};
use alisto_core::offline::{ActionKind, DraftStore};
use alisto_core::utils::{format_date, format_peso, format_phone, truncate_string};
use alisto_core::{ActionRegistry, Connectivity, DrainReport, Feeds, OfflineManager, Submission};

use crate::{CacheCommand, Command, Context, DraftCommand, QueueCommand};

/// Width used when truncating summaries.
const SUMMARY_WIDTH: usize = 72;

pub async fn run(ctx: &mut Context, command: Command) -> Result<()> {
    match command {
        Command::News {
            category,
            featured,
            search,
            pages,
        } => news(ctx, category, featured, search, pages).await,
        Command::Spots { search } => spots(ctx, search).await,
        Command::Hotlines => hotlines(ctx).await,
        Command::Projects { search } => projects(ctx, search).await,
        Command::Login { email } => login(ctx, email).await,
        Command::Logout => logout(ctx).await,
        Command::Queue { action } => queue(ctx, action).await,
        Command::Draft { action } => draft(ctx, action).await,
        Command::Cache { action } => cache(ctx, action).await,
    }
}

fn feeds(ctx: &Context) -> Feeds {
    Feeds::new(ctx.api.clone(), ctx.cache.clone())
}

// ===== Browsing =====

async fn news(
    ctx: &Context,
    category: Option<String>,
    featured: bool,
    search: Option<String>,
    pages: u32,
) -> Result<()> {
    let category = match category {
        Some(name) => Some(NewsCategory::parse(&name).with_context(|| {
            let known: Vec<&str> = NewsCategory::ALL.iter().map(|c| c.as_str()).collect();
            format!("Unknown category '{}'. Known: {}", name, known.join(", "))
        })?),
        None => None,
    };
    let filter = NewsFilter {
        category,
        featured: featured.then_some(true),
        trending: None,
        search_term: search,
    };

    let fetcher = feeds(ctx).news(filter);
    let mut state = fetcher.settled().await;
    for _ in 1..pages.max(1) {
        if !fetcher.load_more().await {
            break;
        }
        state = fetcher.state();
    }

    if let Some(ref error) = state.error {
        if state.items.is_empty() {
            bail!("Could not load news: {}", error);
        }
        warn!(error = %error, "Showing partial news list");
    }
    for article in &state.items {
        let date = article.published_date.as_deref().map(format_date).unwrap_or_default();
        println!("[{}] {} ({})", article.category, article.title, date);
        if !article.summary.is_empty() {
            println!("    {}", truncate_string(&article.summary, SUMMARY_WIDTH));
        }
    }
    if let Some(total) = state.total_count() {
        println!("{} of {} articles", state.items.len(), total);
    }
    Ok(())
}

async fn spots(ctx: &Context, search: Option<String>) -> Result<()> {
    let query = TouristSpotQuery {
        search_term: search,
        ..Default::default()
    };
    let state = feeds(ctx).tourist_spots(query).settled().await;
    let Some(spots) = state.data else {
        bail!("Could not load tourist spots: {}", state.error.unwrap_or_default());
    };

    for spot in &spots {
        let fee = spot.entrance_fee.map(format_peso).unwrap_or_else(|| "-".to_string());
        println!("{} - {} ({:.1}★, {})", spot.name, spot.location, spot.rating, fee);
        if let Some(ref image) = spot.image_url {
            println!("    {}", ctx.api.image_url(image));
        }
    }
    Ok(())
}

async fn hotlines(ctx: &Context) -> Result<()> {
    let state = feeds(ctx).hotlines().settled().await;
    let Some(hotlines) = state.data else {
        bail!("Could not load hotlines: {}", state.error.unwrap_or_default());
    };

    for hotline in &hotlines {
        let hours = if hotline.is_available_24_hours { " (24/7)" } else { "" };
        println!("{:<32} {}{}", hotline.name, format_phone(&hotline.phone_number), hours);
    }
    if let Some(age) = ctx.cache.age_display(alisto_core::cache::keys::EMERGENCY_HOTLINES).await {
        println!("Updated {}", age);
    }
    Ok(())
}

async fn projects(ctx: &Context, search: Option<String>) -> Result<()> {
    let filter = ProjectFilter {
        status: None,
        search_term: search,
    };
    let state = feeds(ctx).public_projects(filter).settled().await;
    if let Some(error) = state.error {
        bail!("Could not load projects: {}", error);
    }

    for project in &state.items {
        println!(
            "{} [{}] {:.0}% - {}",
            project.title,
            project.status,
            project.progress(),
            format_peso(project.budget)
        );
    }
    Ok(())
}

// ===== Session =====

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn login(ctx: &mut Context, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| ctx.config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;

    let auth = ctx.api.login(&email, &password).await?;
    let data = SessionData::from_auth(auth)?;
    let name = data.user.full_name();
    let expires = data.expires_at.with_timezone(&Local).format("%b %d %H:%M");
    ctx.session.update(data).await?;

    ctx.config.last_email = Some(email);
    ctx.config.save()?;

    println!("Signed in as {} (session valid until {})", name, expires);
    Ok(())
}

async fn logout(ctx: &mut Context) -> Result<()> {
    if ctx.api.has_token() {
        if let Err(e) = ctx.api.logout().await {
            debug!(error = %e, "Server logout failed, clearing local session anyway");
        }
    }
    ctx.session.clear().await?;
    println!("Signed out");
    Ok(())
}

// ===== Offline queue =====

async fn offline_manager(ctx: &Context) -> Result<OfflineManager> {
    let online = ctx.api.ping().await;
    debug!(online, "Checked connectivity");
    OfflineManager::new(
        ctx.store.clone(),
        ActionRegistry::for_api(ctx.api.clone()),
        Connectivity::new(online),
    )
    .await
}

fn print_report(report: &DrainReport) {
    println!("{}", report.summary());
    for action in &report.dropped {
        println!("  gave up on {} {} after {} attempts", action.kind, action.id, action.retry_count);
    }
    for action in &report.unhandled {
        println!("  no handler for {} {}", action.kind, action.id);
    }
}

async fn queue(ctx: &Context, command: QueueCommand) -> Result<()> {
    let manager = offline_manager(ctx).await?;
    match command {
        QueueCommand::List => {
            let actions = manager.pending_actions().await;
            if actions.is_empty() {
                println!("No pending actions");
            }
            for action in actions {
                println!(
                    "{}  {:<24} retries={}  {}",
                    action.id,
                    action.kind,
                    action.retry_count,
                    truncate_string(&action.payload.to_string(), SUMMARY_WIDTH)
                );
            }
        }
        QueueCommand::Add { kind, payload } => {
            if ActionKind::parse(&kind).is_none() {
                warn!(kind = %kind, "Queuing an action kind this client cannot send");
            }
            let payload: Value = serde_json::from_str(&payload).context("Payload must be JSON")?;
            let action = manager.add_pending_action(&kind, payload).await?;
            println!("Queued {} ({} pending)", action.id, manager.pending_actions_count());
        }
        QueueCommand::Submit { kind, payload } => {
            let payload: Value = serde_json::from_str(&payload).context("Payload must be JSON")?;
            match manager.submit_or_queue(&kind, payload).await? {
                Submission::Sent => println!("Sent {}", kind),
                Submission::Queued(action) => println!(
                    "Server unreachable; queued {} ({} pending)",
                    action.id,
                    manager.pending_actions_count()
                ),
            }
        }
        QueueCommand::Drain => {
            if !manager.is_online() {
                println!(
                    "Server unreachable; {} action(s) still pending",
                    manager.pending_actions_count()
                );
                return Ok(());
            }
            let report = manager.process_pending_actions().await?;
            print_report(&report);
        }
        QueueCommand::Clear => {
            manager.clear_all_pending_actions().await?;
            println!("Cleared pending actions");
        }
    }
    Ok(())
}

// ===== Drafts & cache =====

async fn draft(ctx: &Context, command: DraftCommand) -> Result<()> {
    let drafts = DraftStore::new(ctx.store.clone());
    match command {
        DraftCommand::Save { form_id, data } => {
            let data: Value = serde_json::from_str(&data).context("Draft must be JSON")?;
            drafts.save(&form_id, &data).await?;
            println!("Saved draft '{}'", form_id);
        }
        DraftCommand::Show { form_id } => match drafts.get::<Value>(&form_id).await? {
            Some(draft) => println!("{}", serde_json::to_string_pretty(&draft.data)?),
            None => println!("No draft '{}'", form_id),
        },
        DraftCommand::Clear { form_id } => {
            drafts.clear(&form_id).await?;
            println!("Cleared draft '{}'", form_id);
        }
    }
    Ok(())
}

async fn cache(ctx: &Context, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Sweep => {
            let removed = ctx.cache.sweep_expired().await?;
            println!("Removed {} expired cache entr{}", removed, if removed == 1 { "y" } else { "ies" });
        }
    }
    Ok(())
}
