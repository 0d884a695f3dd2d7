//! One-shot commands: login, logout, ask, products, history.

use anyhow::{anyhow, bail, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use insightlens_core::chart::RenderableChart;
use insightlens_core::{
    describe_tool, BadgeColor, ChatSession, Config, InsightClient, Session, ToolBadge, TurnStatus,
};
use tracing::info;

fn colored_badge(badge: &ToolBadge) -> ColoredString {
    let text = format!("[{} {}]", badge.icon, badge.label);
    match badge.color {
        BadgeColor::Blue => text.blue(),
        BadgeColor::Green => text.green(),
        BadgeColor::Magenta => text.magenta(),
        BadgeColor::Yellow => text.yellow(),
        BadgeColor::Cyan => text.cyan(),
        BadgeColor::Red => text.red(),
        BadgeColor::Neutral => text.dimmed(),
    }
}

fn authed_client(config: &Config) -> Result<InsightClient> {
    let session = Session::load()?
        .ok_or_else(|| anyhow!("Not logged in. Run `insightlens login` first."))?;
    Ok(InsightClient::new(&config.api_url()).with_token(session.token))
}

pub async fn login(config: &Config, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();
    let email = match email {
        Some(email) => email,
        None => Input::with_theme(&theme).with_prompt("Email").interact_text()?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;

    let client = InsightClient::new(&config.api_url());
    println!("🔐 Signing in to {}...", client.base_url().cyan());

    match client.login(&email, &password).await {
        Ok(token) => {
            Session {
                token,
                email: Some(email.clone()),
            }
            .save()?;
            info!(%email, "Logged in");
            println!("{} {}", "Logged in as".green(), email.bold());
        }
        Err(e) => {
            println!("{}: {}", "Login failed".red(), e);
        }
    }

    Ok(())
}

pub fn logout() -> Result<()> {
    Session::clear()?;
    info!("Logged out");
    println!("{}", "Logged out.".green());
    Ok(())
}

pub async fn ask(config: &Config, question: &str, product: Option<i64>) -> Result<()> {
    let client = authed_client(config)?;
    let (mut chat, mut events) = ChatSession::with_client(client, config);
    if product.is_some() {
        chat.set_context_product(product);
    }

    println!("🤖 Asking: {}\n", question.bold().cyan());

    let mut input = question.to_string();
    let turn = match chat.submit(&mut input) {
        Ok(turn) => turn,
        Err(e) if e.is_silent() => bail!("Nothing to ask"),
        Err(e) => return Err(e.into()),
    };

    let event = events
        .recv()
        .await
        .ok_or_else(|| anyhow!("Answer was cancelled"))?;
    if let Err(e) = chat.apply(event) {
        if e.is_unauthorized() {
            Session::clear()?;
            println!("{}", "Your session has expired. Run `insightlens login` again.".red());
            return Ok(());
        }
        info!("Question failed: {}", e);
    }

    let Some(answer) = chat.store().get(turn) else {
        bail!("Answer went missing");
    };

    if answer.status == TurnStatus::Error {
        println!("{}", answer.text.red());
        return Ok(());
    }

    if let Some(tool) = &answer.tool_used {
        println!("{}", colored_badge(&tool.describe()));
    }
    println!("{}", answer.text);

    if let Some(spec) = &answer.chart_spec {
        println!();
        print_chart(&insightlens_core::render_chart(spec));
    }

    Ok(())
}

fn print_chart(chart: &RenderableChart) {
    println!("{}", format!("📊 {}", chart.title()).bold().magenta());
    match chart {
        RenderableChart::Pie { slices, .. } => {
            for slice in slices {
                println!("  • {}: {}", slice.label, slice.value.to_string().bold());
            }
        }
        RenderableChart::Line {
            categories,
            series,
            axes,
            ..
        } => {
            if let Some(axes) = axes {
                println!(
                    "  {}",
                    format!("axes: {} / {}", axes.primary, axes.secondary).dimmed()
                );
            }
            for s in series {
                let points: Vec<String> = categories
                    .iter()
                    .zip(s.values.iter())
                    .map(|(c, v)| format!("{}={}", c, v))
                    .collect();
                println!("  • {}: {}", s.label.bold(), points.join(", "));
            }
        }
        RenderableChart::Bar { groups, .. } => {
            for group in groups {
                let bars: Vec<String> = group
                    .bars
                    .iter()
                    .map(|b| {
                        if b.series.is_empty() {
                            b.value.to_string()
                        } else {
                            format!("{} {}", b.series, b.value)
                        }
                    })
                    .collect();
                println!("  • {}: {}", group.label, bars.join(", "));
            }
        }
    }
}

pub async fn products(config: &Config) -> Result<()> {
    let client = authed_client(config)?;

    println!("\n{}", "📦 Products".bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    let products = client.list_products().await?;
    if products.is_empty() {
        println!("{}", "No products found".yellow());
    }
    for product in products {
        println!(
            "{}  {} {}",
            format!("{:>4}", product.id).bold().yellow(),
            product.name,
            product.category.dimmed()
        );
    }

    Ok(())
}

pub async fn history(config: &Config) -> Result<()> {
    let client = authed_client(config)?;

    println!("\n{}", "🕘 Recent questions".bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    let entries = client.history().await?;
    if entries.is_empty() {
        println!("{}", "No questions asked yet".yellow());
    }
    for entry in entries {
        let badge = describe_tool(entry.tool_used.as_deref())
            .map(|badge| colored_badge(&badge).to_string())
            .unwrap_or_default();
        let chart = if entry.has_chart { " 📊" } else { "" };
        println!(
            "\n{} {}{}",
            entry.timestamp.dimmed(),
            badge,
            chart
        );
        println!("{} {}", "Q:".bold().cyan(), entry.query);
        println!("{} {}", "A:".bold().yellow(), entry.answer);
    }

    Ok(())
}
