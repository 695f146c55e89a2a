//! Markdown rendering of a dossier for terminal output.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::models::{
    DocumentsSection, Dossier, FinancialTable, ForumSource, ForumThread, NewsItem, PriceSeries,
    Section,
};

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
pub const SPARKLINE_WIDTH: usize = 60;

/// Close-price sparkline over the whole series, resampled to `width` points.
pub fn sparkline(series: &PriceSeries, width: usize) -> String {
    let closes: Vec<f64> = series
        .closes()
        .filter_map(|(_, close)| close.to_f64())
        .collect();
    if closes.is_empty() || width == 0 {
        return String::new();
    }

    let points: Vec<f64> = if closes.len() <= width {
        closes
    } else {
        (0..width)
            .map(|i| closes[i * (closes.len() - 1) / (width - 1).max(1)])
            .collect()
    };

    let min = points.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = points.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    points
        .iter()
        .map(|p| {
            if span <= f64::EPSILON {
                SPARK_LEVELS[SPARK_LEVELS.len() / 2]
            } else {
                let level = ((p - min) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
                SPARK_LEVELS[level.min(SPARK_LEVELS.len() - 1)]
            }
        })
        .collect()
}

fn money(value: Decimal, currency: Option<&str>) -> String {
    match currency {
        Some("INR") | None => format!("₹{:.2}", value),
        Some(other) => format!("{:.2} {}", value, other),
    }
}

fn push_news(out: &mut String, items: &Section<Vec<NewsItem>>) {
    match items {
        Section::Ready(items) if items.is_empty() => out.push_str("_No headlines._\n"),
        Section::Ready(items) => {
            for item in items {
                if item.published.is_empty() {
                    out.push_str(&format!("- [{}]({})\n", item.title, item.link));
                } else {
                    out.push_str(&format!(
                        "- [{}]({}) · {}\n",
                        item.title, item.link, item.published
                    ));
                }
            }
        }
        Section::Unavailable(reason) => out.push_str(&format!("_{}_\n", reason)),
    }
    out.push('\n');
}

fn push_table(out: &mut String, table: &FinancialTable) {
    if table.headers.is_empty() && table.rows.is_empty() {
        out.push_str("_Empty table._\n\n");
        return;
    }

    let columns = table
        .headers
        .len()
        .max(table.rows.iter().map(Vec::len).max().unwrap_or(0));
    let cell = |cells: &[String], i: usize| {
        cells.get(i).map(String::as_str).unwrap_or("").to_string()
    };

    let header: Vec<String> = (0..columns).map(|i| cell(&table.headers, i)).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!("|{}\n", "---|".repeat(columns)));
    for row in &table.rows {
        let cells: Vec<String> = (0..columns).map(|i| cell(row, i)).collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out.push('\n');
}

fn push_threads(out: &mut String, threads: &Section<Vec<ForumThread>>) {
    match threads {
        Section::Ready(threads) if threads.is_empty() => {
            out.push_str("_No threads in the last 90 days._\n")
        }
        Section::Ready(threads) => {
            for thread in threads {
                let origin = match &thread.source {
                    ForumSource::ValuePickr => String::new(),
                    ForumSource::Reddit { subreddit } => format!("r/{} · ", subreddit),
                };
                let score = thread
                    .score
                    .map(|s| format!(", score {}", s))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "- [{}]({}) ({}{} replies{}, {})\n",
                    thread.title,
                    thread.url,
                    origin,
                    thread.replies,
                    score,
                    thread.published.format("%d %b %Y")
                ));
            }
        }
        Section::Unavailable(reason) => out.push_str(&format!("_{}_\n", reason)),
    }
    out.push('\n');
}

pub fn render_markdown(dossier: &Dossier) -> String {
    let mut out = String::new();
    let quote = &dossier.quote;

    // ── Header ──
    let title = quote.name.as_deref().unwrap_or(&dossier.base_symbol);
    out.push_str(&format!("# {} ({})\n\n", title, dossier.symbol));
    out.push_str(&format!(
        "Exchange: **{}** • Generated {}\n\n",
        dossier.exchange,
        dossier.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    // ── Key metrics ──
    let currency = quote.currency.as_deref();
    out.push_str("| Price | 52W High | 52W Low | Sector |\n");
    out.push_str("|-------|----------|---------|--------|\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        money(quote.price, currency),
        money(quote.fifty_two_week_high, currency),
        money(quote.fifty_two_week_low, currency),
        quote.sector.as_deref().unwrap_or("—"),
    ));

    // ── Price history ──
    out.push_str("## Price History (5Y)\n\n");
    if let (Some(first), Some(last)) = (dossier.history.bars().first(), dossier.history.last()) {
        out.push_str(&format!(
            "`{}`\n\n{} → {} ({} sessions)\n\n",
            sparkline(&dossier.history, SPARKLINE_WIDTH),
            first.date,
            last.date,
            dossier.history.len()
        ));
    }

    // ── News ──
    out.push_str("## Sector News\n\n");
    push_news(&mut out, &dossier.sector_news);
    for feed in &dossier.news {
        out.push_str(&format!("## {}\n\n", feed.source));
        push_news(&mut out, &feed.items);
    }

    // ── Financials ──
    for section in &dossier.financials {
        out.push_str(&format!("## {}\n\n", section.kind.title()));
        match &section.table {
            Section::Ready(table) => push_table(&mut out, table),
            Section::Unavailable(reason) => out.push_str(&format!("_{}_\n\n", reason)),
        }
    }

    // ── Management ──
    out.push_str("## Management\n\n");
    match &dossier.management {
        Section::Ready(names) => {
            for name in names {
                out.push_str(&format!("- {}\n", name));
            }
            out.push('\n');
        }
        Section::Unavailable(reason) => out.push_str(&format!("_{}_\n\n", reason)),
    }

    // ── Forums ──
    out.push_str("## ValuePickr Discussions\n\n");
    push_threads(&mut out, &dossier.valuepickr_threads);
    out.push_str(&format!("[Search the forum]({})\n\n", dossier.forum_search_url));
    out.push_str("## Reddit Discussions\n\n");
    push_threads(&mut out, &dossier.reddit_threads);

    // ── Documents ──
    match &dossier.documents {
        DocumentsSection::NotRequested => {}
        DocumentsSection::KeyMissing(message) => {
            out.push_str("## Document Analysis\n\n");
            out.push_str(&format!("⚠️ {}\n", message));
        }
        DocumentsSection::Analyzed(analyses) => {
            out.push_str("## Document Analysis\n\n");
            for analysis in analyses {
                out.push_str(&format!("### {}\n\n", analysis.file_name));
                out.push_str("**Management Summary**\n\n");
                out.push_str(analysis.management_summary.trim());
                out.push_str("\n\n**Integrity Matrix**\n\n");
                out.push_str(analysis.integrity_matrix.trim());
                out.push_str("\n\n");
            }
        }
    }

    out
}
