//! Line-oriented intake: each stdin line is one chat message.
//!
//! `sender<TAB>text` attributes the message; bare text uses the configured
//! default sender. Lines starting with `/` are operator commands.

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdout},
    sync::Mutex,
};

use carelog_core::{
    config::Config,
    domain::{Category, SenderId},
    messaging::{port::ReplyPort, types::IncomingText},
    service::CareLogService,
    store::RecordQuery,
    utils::now_local,
};

/// The single output stream shared by replies and command results.
pub struct Console<W = Stdout> {
    out: Mutex<W>,
}

impl Console<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> Console<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Write one blank-line-terminated block.
    pub async fn write_block(&self, text: &str) -> std::io::Result<()> {
        let mut out = self.out.lock().await;
        out.write_all(format!("{text}\n\n").as_bytes()).await?;
        out.flush().await
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ReplyPort for Console<W> {
    async fn send_text(&self, to: &SenderId, text: &str) -> carelog_core::Result<()> {
        self.write_block(&format!("@{}\n{text}", to.0)).await?;
        Ok(())
    }
}

pub async fn run_stdin<W: AsyncWrite + Unpin + Send>(
    cfg: &Config,
    service: &CareLogService,
    console: &Console<W>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tracing::info!("reading messages from stdin");

    while let Some(line) = lines.next_line().await.context("read stdin")? {
        handle_line(cfg, service, console, &line).await?;
    }

    tracing::info!("stdin closed; shutting down");
    Ok(())
}

/// One intake line. Only a failing console is an error.
async fn handle_line<W: AsyncWrite + Unpin + Send>(
    cfg: &Config,
    service: &CareLogService,
    console: &Console<W>,
    line: &str,
) -> anyhow::Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    if line.starts_with('/') {
        let out = match run_command(cfg, service, line).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(error = %e, "command failed");
                format!("error: {e:#}")
            }
        };
        console.write_block(&out).await.context("write stdout")?;
        return Ok(());
    }

    service.handle(split_sender(line, &cfg.default_sender)).await;
    Ok(())
}

fn split_sender(line: &str, default_sender: &str) -> IncomingText {
    match line.split_once('\t') {
        Some((sender, text)) if !sender.trim().is_empty() => {
            IncomingText::new(sender.trim(), text.trim())
        }
        _ => IncomingText::new(default_sender, line),
    }
}

fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();
    (first.trim_start_matches('/').to_lowercase(), rest)
}

async fn run_command(cfg: &Config, service: &CareLogService, line: &str) -> anyhow::Result<String> {
    let (cmd, args) = parse_command(line);
    match cmd.as_str() {
        "parse" => {
            let parsed = service.engine().parse(&args, now_local());
            Ok(serde_json::to_string_pretty(&parsed)?)
        }
        "records" => {
            let filter = parse_records_args(&args, cfg.query_limit)?;
            let records = service.store().query(&filter).await?;
            Ok(serde_json::to_string_pretty(&records)?)
        }
        "help" => Ok(HELP.to_string()),
        other => anyhow::bail!("unknown command /{other} (try /help)"),
    }
}

const HELP: &str = "\
/parse <text>                            show how a message would be parsed
/records [start] [end] [category] [limit]  list active records (use - to skip a filter)";

/// `[start] [end] [category] [limit]`, positional; `-` leaves one unset.
fn parse_records_args(args: &str, default_limit: usize) -> anyhow::Result<RecordQuery> {
    let mut filter = RecordQuery {
        limit: default_limit,
        ..RecordQuery::default()
    };
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() > 4 {
        anyhow::bail!("too many arguments; expected [start] [end] [category] [limit]");
    }
    let arg = |i: usize| parts.get(i).copied().filter(|s| *s != "-");

    if let Some(s) = arg(0) {
        filter.start = Some(parse_date(s)?);
    }
    if let Some(s) = arg(1) {
        filter.end = Some(parse_date(s)?);
    }
    if let Some(s) = arg(2) {
        filter.category = Some(s.parse::<Category>()?);
    }
    if let Some(s) = arg(3) {
        filter.limit = s.parse().with_context(|| format!("invalid limit {s:?}"))?;
    }
    Ok(filter)
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use carelog_core::{parser::Engine, store::MemoryStore};

    #[tokio::test]
    async fn replies_and_command_output_share_one_stream() {
        let cfg = Config::default();
        let console = Arc::new(Console::new(Vec::<u8>::new()));
        let service = CareLogService::new(
            Arc::new(Engine::new(cfg.parser()).unwrap()),
            Arc::new(MemoryStore::new()),
            console.clone(),
        );

        for line in ["mom\t晚上10点吃奶粉120毫升", "   ", "/bogus", "/records - - 吃"] {
            handle_line(&cfg, &service, &*console, line).await.unwrap();
        }

        let out = String::from_utf8(console.out.lock().await.clone()).unwrap();
        let blocks: Vec<&str> = out.split("\n\n").filter(|b| !b.is_empty()).collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].starts_with("@mom\n记录添加成功！"));
        assert!(blocks[1].starts_with("error: unknown command /bogus"));
        assert!(blocks[2].contains("\"amount\": \"120\""));
    }

    #[test]
    fn tab_separates_sender() {
        let msg = split_sender("mom\t9点喝奶120ml", "local");
        assert_eq!(msg.sender, SenderId("mom".to_string()));
        assert_eq!(msg.text, "9点喝奶120ml");

        let msg = split_sender("9点喝奶120ml", "local");
        assert_eq!(msg.sender, SenderId("local".to_string()));
    }

    #[test]
    fn command_name_is_case_insensitive() {
        assert_eq!(
            parse_command("/Parse 9点喝奶"),
            ("parse".to_string(), "9点喝奶".to_string())
        );
        assert_eq!(parse_command("/records"), ("records".to_string(), String::new()));
    }

    #[test]
    fn records_args_are_positional() {
        let q = parse_records_args("2026-03-01 - 大便 5", 100).unwrap();
        assert_eq!(q.start, NaiveDate::from_ymd_opt(2026, 3, 1));
        assert_eq!(q.end, None);
        assert_eq!(q.category, Some(Category::Stool));
        assert_eq!(q.limit, 5);

        let q = parse_records_args("", 42).unwrap();
        assert_eq!(q, RecordQuery { limit: 42, ..RecordQuery::default() });

        assert!(parse_records_args("03/01", 100).is_err());
        assert!(parse_records_args("- - feeding many", 100).is_err());
    }
}
