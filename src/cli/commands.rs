use std::fmt::Write as _;
use std::io::{self, Read};

use anyhow::{bail, Context, Result};
use clap::Args;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::app::App;
use crate::config::AppConfig;
use crate::outline::{self, DecodePolicy};
use crate::storage::{FileRecord, FileStore};

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Name for the file (prompted if omitted)
    #[arg()]
    pub name: Option<String>,
    /// Provide the outline inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// File identifier
    pub file_id: i64,
    /// Keep non-bullet lines as top-level items instead of dropping them
    #[arg(long)]
    pub preserve_unmatched: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NormalizeArgs {
    /// Keep non-bullet lines as top-level items instead of dropping them
    #[arg(long)]
    pub preserve_unmatched: bool,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn new_file(store: &dyn FileStore, args: NewArgs) -> Result<()> {
    let name = match args.name {
        Some(n) => n,
        None => prompt("Name")?,
    };
    let body = match args.body {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };
    let file_id = create_file(store, &name, &body)?;
    println!("Created file #{file_id}");
    Ok(())
}

fn create_file(store: &dyn FileStore, name: &str, body: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        bail!("file name cannot be empty");
    }
    let content = outline::encode(&outline::decode(body));
    store.create_file(name, &content).context("creating file")
}

pub fn list_files(store: &dyn FileStore) -> Result<()> {
    let files = store.list_files().context("listing files")?;
    print!("{}", format_file_list(&files));
    Ok(())
}

fn format_file_list(files: &[FileRecord]) -> String {
    if files.is_empty() {
        return "No files yet.\n".to_string();
    }
    let mut out = String::new();
    for file in files {
        let doc = outline::decode(&file.content);
        let _ = writeln!(&mut out, "#{}  {}", file.id, file.name);
        let _ = writeln!(
            &mut out,
            "    updated {}  •  {} item(s)",
            format_timestamp(file.updated_at),
            doc.len()
        );
        if let Some(first) = doc.get(0) {
            let _ = writeln!(&mut out, "    {}", first.text);
        }
        out.push('\n');
    }
    out
}

pub fn show_file(config: &AppConfig, store: &dyn FileStore, args: ShowArgs) -> Result<()> {
    let policy = if args.preserve_unmatched {
        DecodePolicy::PreserveAsText
    } else {
        config.outline.decode_policy()
    };
    let content = store
        .load_content(args.file_id)
        .with_context(|| format!("loading file {}", args.file_id))?;
    println!("{}", normalize(&content, policy));
    Ok(())
}

pub fn normalize_stdin(args: &NormalizeArgs) -> Result<()> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("reading outline from stdin")?;
    let policy = if args.preserve_unmatched {
        DecodePolicy::PreserveAsText
    } else {
        DecodePolicy::DropUnmatched
    };
    println!("{}", normalize(&input, policy));
    Ok(())
}

/// Re-encodes outline text: bullets become `•`, indentation becomes two
/// spaces per level and blank lines disappear.
pub fn normalize(input: &str, policy: DecodePolicy) -> String {
    outline::encode(&outline::decode_with(input, policy))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_timestamp(epoch: i64) -> String {
    OffsetDateTime::from_unix_timestamp(epoch)
        .map(|dt| dt.format(&Rfc3339).unwrap_or_else(|_| epoch.to_string()))
        .unwrap_or_else(|_| epoch.to_string())
}
