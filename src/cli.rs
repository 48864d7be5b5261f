use crate::content::{ContentItemInput, ContentStatus, ContentType, Platform};

pub const USAGE: &str = r#"Usage: creatorflow <command> [args]

Commands:
  list                         List all content items
  board                        Show the board grouped by status
  show <id>                    Show one item in full
  new <title> [flags]          Create an item
  edit <id> [flags]            Edit an item (--title also accepted)
  delete <id> --yes            Delete an item permanently
  draft <id>                   Generate a draft with Gemini
  thumbnail <id>               Generate a thumbnail with Gemini
  ideas <id>                   Append content angles from research notes
  config show                  Print settings (API key masked)
  config set <field> <value>   Update one setting
  recover list                 List quarantined copies of unreadable data
  recover show <key>           Print one quarantined copy
  recover delete <key> --yes   Delete a quarantined copy

Flags:
  --topic <text>  --type <Video|Article|Newsletter|Short>
  --platform <YouTube|Substack|Both>
  --status <Idea|Research|Drafting|Production|Published>
  --notes <text>  --draft <text>  --thumbnail <url>"#;

#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    List,
    Board,
    Show { id: String },
    New { input: ContentItemInput },
    Edit { id: String, input: ContentItemInput },
    Delete { id: String, confirmed: bool },
    Draft { id: String },
    Thumbnail { id: String },
    Ideas { id: String },
    ConfigShow,
    ConfigSet { field: String, value: String },
    RecoverList,
    RecoverShow { key: String },
    RecoverDelete { key: String, confirmed: bool },
    Help,
}

pub fn parse_args<I>(args: I) -> Result<CliCommand, String>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let Some((verb, rest)) = args.split_first() else {
        return Ok(CliCommand::Help);
    };

    let command = match verb.as_str() {
        "list" | "ls" => CliCommand::List,
        "board" => CliCommand::Board,
        "show" => CliCommand::Show {
            id: positional(rest, "id")?,
        },
        "new" => {
            let title = positional(rest, "title")?;
            let mut input = parse_flags(&rest[1..])?;
            input.title = Some(title);
            CliCommand::New { input }
        }
        "edit" => CliCommand::Edit {
            id: positional(rest, "id")?,
            input: parse_flags(&rest[1..])?,
        },
        "delete" | "rm" => CliCommand::Delete {
            id: positional(rest, "id")?,
            confirmed: rest[1..].iter().any(|a| a == "--yes" || a == "-y"),
        },
        "draft" => CliCommand::Draft {
            id: positional(rest, "id")?,
        },
        "thumbnail" => CliCommand::Thumbnail {
            id: positional(rest, "id")?,
        },
        "ideas" => CliCommand::Ideas {
            id: positional(rest, "id")?,
        },
        "config" => match rest.first().map(String::as_str) {
            Some("show") | None => CliCommand::ConfigShow,
            Some("set") => CliCommand::ConfigSet {
                field: positional(&rest[1..], "field")?,
                value: positional(rest.get(2..).unwrap_or(&[]), "value")?,
            },
            Some(other) => return Err(format!("Unknown config action: {}", other)),
        },
        "recover" => match rest.first().map(String::as_str) {
            Some("list") | None => CliCommand::RecoverList,
            Some("show") => CliCommand::RecoverShow {
                key: positional(&rest[1..], "key")?,
            },
            Some("delete") => CliCommand::RecoverDelete {
                key: positional(&rest[1..], "key")?,
                confirmed: rest[1..].iter().any(|a| a == "--yes" || a == "-y"),
            },
            Some(other) => return Err(format!("Unknown recover action: {}", other)),
        },
        "help" | "--help" | "-h" => CliCommand::Help,
        other => return Err(format!("Unknown command: {}", other)),
    };

    Ok(command)
}

fn positional(args: &[String], name: &str) -> Result<String, String> {
    match args.first() {
        Some(value) if !value.starts_with("--") => Ok(value.clone()),
        _ => Err(format!("Missing <{}>", name)),
    }
}

fn parse_flags(args: &[String]) -> Result<ContentItemInput, String> {
    let mut input = ContentItemInput::default();
    let mut iter = args.iter();

    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .cloned()
            .ok_or_else(|| format!("Missing value for {}", flag))?;

        match flag.as_str() {
            "--title" => input.title = Some(value),
            "--topic" => input.topic = Some(value),
            "--notes" => input.research_notes = Some(value),
            "--draft" => input.draft_content = Some(value),
            "--thumbnail" => input.thumbnail_url = Some(value),
            "--type" => {
                input.content_type = Some(
                    ContentType::parse(&value).ok_or_else(|| format!("Unknown type: {}", value))?,
                )
            }
            "--platform" => {
                input.platform = Some(
                    Platform::parse(&value).ok_or_else(|| format!("Unknown platform: {}", value))?,
                )
            }
            "--status" => {
                input.status = Some(
                    ContentStatus::parse(&value)
                        .ok_or_else(|| format!("Unknown status: {}", value))?,
                )
            }
            other => return Err(format!("Unknown flag: {}", other)),
        }
    }

    Ok(input)
}
