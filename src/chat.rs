// Terminal front end for the same session machine the web UI drives.

use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;

use crate::gateway::Gateway;
use crate::models::{ResourceBundle, Scenario};
use crate::scenarios;
use crate::search::{self, QuoteSearch, SearchStatus};
use crate::session::{self, Session, TurnOutcome};

#[derive(Debug, PartialEq, Eq)]
pub enum ChatCommand<'a> {
    Say(&'a str),
    Search(&'a str),
    Reset,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> ChatCommand<'_> {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }
    match line.split_once(char::is_whitespace) {
        Some(("/search", rest)) => ChatCommand::Search(rest.trim()),
        _ => match line {
            "/search" => ChatCommand::Search(""),
            "/reset" => ChatCommand::Reset,
            "/quit" | "/exit" => ChatCommand::Quit,
            text => ChatCommand::Say(text),
        },
    }
}

/// Accepts a scenario id or its 1-based position in the catalog.
pub fn resolve_scenario(choice: &str) -> Option<&'static Scenario> {
    let choice = choice.trim();
    if let Ok(n) = choice.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| scenarios::all().get(i));
    }
    scenarios::find(choice)
}

pub fn render_scenario_menu() -> String {
    scenarios::all()
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  {}. {} ({}) - {}", i + 1, s.title, s.id, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_bundle(bundle: &ResourceBundle) -> String {
    let mut out = String::new();

    if !bundle.scripture.is_empty() {
        out.push_str("\nScripture:\n");
        for s in &bundle.scripture {
            out.push_str(&format!("  {}: {}\n", s.reference, s.text));
        }
    }
    if !bundle.quotes.is_empty() {
        out.push_str("\nEllen G. White:\n");
        for q in &bundle.quotes {
            out.push_str(&format!("  \"{}\" - {}\n", q.text, q.source));
        }
    }
    if !bundle.practical_steps.is_empty() {
        out.push_str("\nPractical steps:\n");
        for (i, step) in bundle.practical_steps.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, step));
        }
    }
    if !bundle.additional_resources.is_empty() {
        out.push_str("\nAdditional resources:\n");
        for r in &bundle.additional_resources {
            out.push_str(&format!("  {}: {}\n", r.title, r.description));
        }
    }
    out
}

pub fn render_search(search: &QuoteSearch) -> String {
    match search.status() {
        SearchStatus::Failed(msg) => format!("Search failed: {}\n", msg),
        SearchStatus::NoResults(msg) => format!("{}\n", msg),
        _ => search
            .results
            .iter()
            .map(|q| format!("  \"{}\" - {}\n", q.text, q.source))
            .collect(),
    }
}

async fn prompt_scenario<R>(lines: &mut tokio::io::Lines<R>) -> Result<Option<&'static Scenario>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    loop {
        stdout
            .write_all(format!("Choose a scenario:\n{}\n> ", render_scenario_menu()).as_bytes())
            .await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        if let Some(scenario) = resolve_scenario(&line) {
            return Ok(Some(scenario));
        }
        stdout.write_all(b"Unknown scenario.\n").await?;
    }
}

pub async fn run_chat(gateway: Gateway, scenario_id: Option<String>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let scenario = match scenario_id {
        Some(id) => Some(resolve_scenario(&id).ok_or_else(|| anyhow!("Unknown scenario '{}'", id))?),
        None => prompt_scenario(&mut lines).await?,
    };
    let Some(mut scenario) = scenario else {
        return Ok(());
    };

    let session = Mutex::new(Session::new());
    let composer_search = Mutex::new(QuoteSearch::new());
    session.lock().await.select_scenario(scenario);
    info!(scenario = scenario.id, "Starting terminal chat session");

    let welcome = session::welcome_message(scenario).content;
    stdout
        .write_all(format!("{}\n(/search <query>, /reset, /quit)\n", welcome).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_command(&line) {
            ChatCommand::Empty => continue,
            ChatCommand::Quit => break,
            ChatCommand::Reset => {
                session.lock().await.reset();
                composer_search.lock().await.clear();
                match prompt_scenario(&mut lines).await? {
                    Some(next) => {
                        scenario = next;
                        session.lock().await.select_scenario(scenario);
                        let welcome = session::welcome_message(scenario).content;
                        stdout.write_all(format!("{}\n", welcome).as_bytes()).await?;
                    }
                    None => break,
                }
            }
            ChatCommand::Search(query) => {
                search::run(&composer_search, &gateway, query).await;
                let rendered = render_search(&*composer_search.lock().await);
                stdout.write_all(rendered.as_bytes()).await?;
            }
            ChatCommand::Say(text) => {
                let outcome = session::send_message(&session, &gateway, text).await;
                let state = session.lock().await.snapshot();
                let reply = state
                    .transcript
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                let mut out = format!("\n{}\n", reply);
                match outcome {
                    TurnOutcome::Replied => {
                        if let Some(bundle) = &state.latest_bundle {
                            out.push_str(&render_bundle(bundle));
                        }
                    }
                    TurnOutcome::Failed => {
                        if let Some(err) = &state.last_error {
                            out.push_str(&format!("Error: {}\n", err));
                        }
                    }
                    TurnOutcome::Ignored | TurnOutcome::Discarded => {}
                }
                stdout.write_all(out.as_bytes()).await?;
            }
        }
    }

    info!(scenario = scenario.id, "Terminal chat session finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdditionalResource, Quote, Scripture};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), ChatCommand::Empty);
        assert_eq!(parse_command("/quit"), ChatCommand::Quit);
        assert_eq!(parse_command("/reset"), ChatCommand::Reset);
        assert_eq!(parse_command("/search  faith and prayer "), ChatCommand::Search("faith and prayer"));
        assert_eq!(parse_command("/search"), ChatCommand::Search(""));
        assert_eq!(parse_command(" I need help "), ChatCommand::Say("I need help"));
    }

    #[test]
    fn test_resolve_scenario() {
        assert_eq!(resolve_scenario("1").unwrap().id, "spiritual_care");
        assert_eq!(resolve_scenario("crisis_intervention").unwrap().title, "Crisis Intervention");
        assert!(resolve_scenario("0").is_none());
        assert!(resolve_scenario("7").is_none());
        assert!(resolve_scenario("pastoral").is_none());
    }

    #[test]
    fn test_render_bundle_sections() {
        let bundle = ResourceBundle {
            response_text: "unused".to_string(),
            scripture: vec![Scripture {
                reference: "Isaiah 41:10".to_string(),
                text: "Fear thou not".to_string(),
            }],
            quotes: vec![Quote {
                source: "The Ministry of Healing, p. 251".to_string(),
                text: "Nothing tends more to promote health".to_string(),
            }],
            practical_steps: vec!["Pray together".to_string(), "Offer a follow-up visit".to_string()],
            additional_resources: vec![AdditionalResource {
                title: "Adventist Chaplaincy Ministries".to_string(),
                description: "Denominational support for chaplains".to_string(),
            }],
        };
        let out = render_bundle(&bundle);
        assert!(out.contains("Isaiah 41:10: Fear thou not"));
        assert!(out.contains("- The Ministry of Healing, p. 251"));
        assert!(out.contains("  2. Offer a follow-up visit"));
        assert!(out.contains("Adventist Chaplaincy Ministries"));
    }

    #[test]
    fn test_render_empty_search() {
        let mut search = QuoteSearch::new();
        let ticket = search.begin("faith and prayer").unwrap();
        search.complete(ticket, Ok(vec![]));
        assert_eq!(render_search(&search), "No quotes found for your query.\n");
    }
}
