//! Line-oriented chat loop over any reader/writer pair.
//!
//! Commands: `exit` / `quit` to leave, `file:<path>` to attach a file,
//! `clear files` to drop attachments. Anything else is sent as a message.

use std::io::{BufRead, Write};

use tracing::{debug, warn};

use crate::error::AgentError;
use crate::session::{Session, SessionStore};
use crate::{Agent, AgentResult, RunRequest};

/// Run the chat until `exit`, `quit` or end of input. Returns the session.
///
/// An existing session is picked up from `store` when `session_id` names one.
/// The session is saved after every message.
pub async fn run_chat<R: BufRead, W: Write>(
    agent: &mut Agent,
    store: &dyn SessionStore,
    session_id: Option<String>,
    mut input: R,
    mut out: W,
) -> Result<Session, AgentError> {
    let mut session = match session_id {
        Some(id) => match store.load(&id).await? {
            Some(session) => {
                debug!(session_id = %id, messages = session.messages, "resuming session");
                session
            }
            None => Session::with_id(id),
        },
        None => Session::new(),
    };
    writeln!(out, "Session: {}", session.id)?;
    writeln!(out, "Type 'exit' or 'quit' to end the conversation.")?;

    loop {
        write!(out, "\nYou: ")?;
        out.flush()?;

        let Some(line) = read_line(&mut input)? else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        if let Some(path) = line.strip_prefix("file:") {
            match agent.add_file_from_path(path.trim()).await {
                Ok(file) => writeln!(out, "Added file: {} ({})", file.name, file.media_type)?,
                Err(e) => {
                    warn!(path = path.trim(), error = %e, "could not attach file");
                    writeln!(out, "Could not add file: {e}")?;
                }
            }
            continue;
        }
        if line.eq_ignore_ascii_case("clear files") {
            agent.clear_files();
            writeln!(out, "Cleared all files.")?;
            continue;
        }

        let result = agent
            .run(RunRequest::message(line).with_session_id(session.id.clone()))
            .await?;
        session.record_message();
        store.save(&session).await?;

        writeln!(out, "\nAssistant: {}", result.response)?;
        if !result.files.is_empty() {
            offer_to_save(&result, &mut input, &mut out).await?;
        }
    }

    Ok(session)
}

async fn offer_to_save<R: BufRead, W: Write>(
    result: &AgentResult,
    input: &mut R,
    out: &mut W,
) -> Result<(), AgentError> {
    writeln!(out, "\nGenerated {} file(s):", result.files.len())?;
    for file in &result.files {
        writeln!(
            out,
            "- {} ({}, {} bytes)",
            file.name,
            file.media_type,
            file.content.len()
        )?;
    }

    write!(out, "Do you want to save these files? (y/n): ")?;
    out.flush()?;
    let answer = read_line(input)?.unwrap_or_default().to_ascii_lowercase();
    if !matches!(answer.as_str(), "y" | "yes") {
        return Ok(());
    }

    write!(out, "Enter directory to save files (default: current directory): ")?;
    out.flush()?;
    let dir = read_line(input)?
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ".".into());

    match result.save_all_files(&dir).await {
        Ok(paths) => {
            for path in paths {
                writeln!(out, "Saved: {}", path.display())?;
            }
        }
        Err(e) => writeln!(out, "Could not save files: {e}")?,
    }
    Ok(())
}

/// Next trimmed line, or `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>, AgentError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::files::OutputFile;
    use crate::session::{FileSessionStore, NoSessionStore};
    use crate::testing::{text, MockRuntime};
    use crate::tools::ToolRegistry;
    use crate::types::{InvokeResponse, ResponseEvent};
    use crate::AgentConfig;

    fn agent(runtime: MockRuntime) -> Agent {
        Agent::new(runtime, ToolRegistry::new(), AgentConfig::default())
    }

    #[tokio::test]
    async fn chats_until_exit() {
        let runtime = MockRuntime::new(vec![text("Hi there."), text("Still here.")]);
        let requests = runtime.requests.clone();
        let mut agent = agent(runtime);
        let mut out = Vec::new();

        let session = run_chat(
            &mut agent,
            &NoSessionStore,
            None,
            Cursor::new("hello\n\nagain\nexit\nignored\n"),
            &mut out,
        )
        .await
        .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Assistant: Hi there."));
        assert!(out.contains("Assistant: Still here."));
        assert_eq!(session.messages, 2);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].session_id(), Some(session.id.as_str()));
        assert_eq!(requests[1].session_id(), Some(session.id.as_str()));
    }

    #[tokio::test]
    async fn attaches_and_clears_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "abc").unwrap();

        let runtime = MockRuntime::new(vec![text("ok")]);
        let requests = runtime.requests.clone();
        let mut agent = agent(runtime);
        let mut out = Vec::new();
        let script = format!(
            "file:{}\nfile:{}\nsummarize\nclear files\nquit\n",
            path.display(),
            dir.path().join("missing.txt").display()
        );

        run_chat(&mut agent, &NoSessionStore, None, Cursor::new(script), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Added file: notes.txt (text/plain)"));
        assert!(out.contains("Could not add file"));
        assert!(out.contains("Cleared all files."));
        assert!(agent.files().is_empty());

        let requests = requests.lock().unwrap();
        let state = requests[0].get("inlineSessionState").unwrap();
        assert_eq!(state["files"][0]["name"], "notes.txt");
    }

    #[tokio::test]
    async fn saves_generated_files_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let runtime = MockRuntime::new(vec![InvokeResponse::new(vec![
            ResponseEvent::Chunk("Made a chart.".into()),
            ResponseEvent::Files(vec![OutputFile::new(
                "chart.png",
                vec![1, 2, 3],
                "image/png",
            )]),
        ])]);
        let mut agent = agent(runtime);
        let mut out = Vec::new();
        let script = format!("plot\ny\n{}\nexit\n", target.display());

        run_chat(&mut agent, &NoSessionStore, None, Cursor::new(script), &mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("- chart.png (image/png, 3 bytes)"));
        assert_eq!(std::fs::read(target.join("chart.png")).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn resumes_persisted_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut first = agent(MockRuntime::new(vec![text("one")]));
        run_chat(
            &mut first,
            &store,
            Some("chat-1".into()),
            Cursor::new("hi\n"),
            Vec::new(),
        )
        .await
        .unwrap();

        let runtime = MockRuntime::new(vec![text("two")]);
        let requests = runtime.requests.clone();
        let mut second = agent(runtime);
        let session = run_chat(
            &mut second,
            &store,
            Some("chat-1".into()),
            Cursor::new("again\n"),
            Vec::new(),
        )
        .await
        .unwrap();

        assert_eq!(session.messages, 2);
        assert_eq!(requests.lock().unwrap()[0].session_id(), Some("chat-1"));
    }
}
