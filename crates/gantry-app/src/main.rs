use std::io::{BufRead, Write as _};
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use gantry_core::{
    ChatSession, LlmSettings, MessageContent, MessagePart, MessageRole, RobotClassification,
    RobotInformation,
};
use gantry_services::{WorkbenchServices, WorkbenchServicesBuilder};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

fn main() {
    init_tracing();

    let runtime = Runtime::new().expect("tokio runtime");
    let services = WorkbenchServicesBuilder::new(default_db_path())
        .build()
        .expect("initialize workbench services");

    let mut session = services
        .current_session()
        .expect("load current chat session");

    println!("gantry workbench. Type :help for commands, plain text to chat.");
    if !services.is_llm_configured() {
        println!("LLM is not configured yet; set it up with :llm <api-key> [host] [model].");
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("> ");
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                eprintln!("stdin read failed: {error}");
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":quit" || line == ":q" {
            break;
        }

        if let Err(error) = dispatch(&services, &runtime, &mut session, line) {
            eprintln!("error: {error}");
        }
    }
}

fn dispatch(
    services: &WorkbenchServices,
    runtime: &Runtime,
    session: &mut ChatSession,
    line: &str,
) -> Result<()> {
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match command {
        ":help" => print_help(),
        ":upload" => upload(services, rest)?,
        ":docs" => list_documents(services)?,
        ":search" => search_documents(services, rest)?,
        ":delete" => delete_document(services, session, rest)?,
        ":clear-docs" => {
            let removed = services.clear_documents()?;
            *session = services.current_session()?;
            println!("knowledge base cleared ({removed} chat message(s) removed)");
        }
        ":stats" => {
            let stats = services.document_stats()?;
            println!(
                "{} document(s), {} bytes total, {} referenced in chat",
                stats.total_documents, stats.total_size_bytes, stats.referenced_documents
            );
        }
        ":new" => {
            *session = services.new_session()?;
            println!("started session {}", session.id);
        }
        ":clear" => {
            services.clear_session()?;
            *session = services.current_session()?;
            println!("chat cleared");
        }
        ":history" => print_history(session),
        ":regen" => {
            let reply = runtime.block_on(services.regenerate(session))?;
            print_reply(&reply.content);
        }
        ":llm" => configure_llm(services, rest)?,
        ":robot" => robot(services, rest)?,
        _ if command.starts_with(':') => {
            println!("unknown command {command}; try :help");
        }
        _ => {
            let (text, attachment) = split_attachment(services, line)?;
            let reply = runtime.block_on(services.send_message(session, text, attachment))?;
            print_reply(&reply.content);
        }
    }

    Ok(())
}

/// Messages written as `@<document name> <text>` attach a knowledge base
/// document to the turn.
fn split_attachment(
    services: &WorkbenchServices,
    line: &str,
) -> Result<(String, Option<Uuid>)> {
    let Some(rest) = line.strip_prefix('@') else {
        return Ok((line.to_owned(), None));
    };

    let (name, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let document = services
        .document_by_name(name)?
        .with_context(|| format!("no knowledge base document named {name}"))?;
    Ok((text.trim().to_owned(), Some(document.id)))
}

fn upload(services: &WorkbenchServices, path: &str) -> Result<()> {
    anyhow::ensure!(!path.is_empty(), "usage: :upload <path-to-pdf>");

    let path = PathBuf::from(path);
    let bytes =
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_owned());

    let document = services.add_document(name, &bytes, "application/pdf")?;
    println!(
        "added {} ({} bytes, text {})",
        document.name,
        document.size_bytes,
        if document.extracted_text.is_some() {
            "extracted"
        } else {
            "unavailable"
        }
    );
    Ok(())
}

fn list_documents(services: &WorkbenchServices) -> Result<()> {
    let documents = services.list_documents()?;
    if documents.is_empty() {
        println!("knowledge base is empty");
        return Ok(());
    }
    for document in documents {
        println!(
            "{}  {}  {} bytes  {}",
            document.id,
            document.name,
            document.size_bytes,
            document.description.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

fn search_documents(services: &WorkbenchServices, query: &str) -> Result<()> {
    let matches = services.search_documents(query)?;
    if matches.is_empty() {
        println!("no documents match {query:?}");
        return Ok(());
    }
    for document in matches {
        println!("{}  {}", document.id, document.name);
    }
    Ok(())
}

fn delete_document(
    services: &WorkbenchServices,
    session: &mut ChatSession,
    name: &str,
) -> Result<()> {
    anyhow::ensure!(!name.is_empty(), "usage: :delete <document name>");
    let document = services
        .document_by_name(name)?
        .with_context(|| format!("no knowledge base document named {name}"))?;
    let removed = services.delete_document(document.id)?;
    *session = services.current_session()?;
    println!("deleted {name} ({removed} chat message(s) removed)");
    Ok(())
}

fn configure_llm(services: &WorkbenchServices, rest: &str) -> Result<()> {
    if rest.is_empty() {
        let settings = services.llm_settings();
        println!(
            "enabled: {}  provider: {:?}  host: {}  model: {}",
            settings.enabled, settings.provider, settings.api_host, settings.model
        );
        return Ok(());
    }

    let mut parts = rest.split_whitespace();
    let api_key = parts.next().unwrap_or_default().to_owned();
    let mut settings = LlmSettings {
        enabled: true,
        api_key,
        ..LlmSettings::default()
    };
    if let Some(host) = parts.next() {
        settings.api_host = host.to_owned();
    }
    if let Some(model) = parts.next() {
        settings.model = model.to_owned();
    }
    services.save_llm_settings(&settings)?;
    println!("LLM configured for model {}", settings.model);
    Ok(())
}

fn robot(services: &WorkbenchServices, rest: &str) -> Result<()> {
    let (sub, args) = match rest.split_once(char::is_whitespace) {
        Some((sub, args)) => (sub, args.trim()),
        None => (rest, ""),
    };

    match sub {
        "" | "show" => {
            let profile = services.robot_profile()?;
            match profile.classification {
                Some(classification) => println!(
                    "classification: {} / {} ({})",
                    classification.category, classification.kind, classification.description
                ),
                None => println!("classification: not set"),
            }
            match profile.information {
                Some(information) => println!(
                    "robot: {} fw {} ({})",
                    information.name, information.firmware_version, information.main_function
                ),
                None => println!("robot: not set"),
            }
        }
        "classify" => {
            let mut fields = args.splitn(3, ';').map(str::trim);
            let classification = RobotClassification {
                category: fields.next().unwrap_or_default().to_owned(),
                kind: fields.next().unwrap_or_default().to_owned(),
                description: fields.next().unwrap_or_default().to_owned(),
            };
            anyhow::ensure!(
                !classification.category.is_empty(),
                "usage: :robot classify <category>; <kind>; <description>"
            );
            services.set_robot_classification(classification)?;
            println!("classification saved");
        }
        "info" => {
            let mut fields = args.splitn(4, ';').map(str::trim);
            let information = RobotInformation {
                name: fields.next().unwrap_or_default().to_owned(),
                firmware_version: fields.next().unwrap_or_default().to_owned(),
                main_function: fields.next().unwrap_or_default().to_owned(),
                description: fields.next().unwrap_or_default().to_owned(),
            };
            anyhow::ensure!(
                !information.name.is_empty(),
                "usage: :robot info <name>; <firmware>; <function>; <description>"
            );
            services.set_robot_information(information)?;
            println!("robot information saved");
        }
        "clear" => {
            services.clear_robot_profile()?;
            println!("robot profile cleared");
        }
        _ => println!("usage: :robot [show|classify|info|clear]"),
    }
    Ok(())
}

fn print_history(session: &ChatSession) {
    if session.messages.is_empty() {
        println!("(empty session {})", session.id);
        return;
    }
    for message in &session.messages {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        println!("[{role}] {}", render_content(&message.content));
    }
}

fn render_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts
            .iter()
            .map(|part| match part {
                MessagePart::Text { text } => text.clone(),
                MessagePart::File { name } => format!("<attached: {name}>"),
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn print_reply(content: &MessageContent) {
    println!("{}", render_content(content));
}

fn print_help() {
    println!(
        "\
:upload <path>                    add a PDF to the knowledge base
:docs                             list knowledge base documents
:search <query>                   search documents by name, description or tag
:delete <name>                    delete a document and its chat references
:clear-docs                       empty the knowledge base
:stats                            knowledge base statistics
:new                              start a fresh chat session
:clear                            clear the current chat
:history                          print the current chat
:regen                            regenerate the last assistant reply
:llm [<api-key> [host] [model]]   show or update LLM settings
:robot [show|classify|info|clear] robot profile capture
@<doc name> <text>                chat with a document attached
:quit                             exit"
    );
}

fn default_db_path() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("gantry");
    base.push("workbench.sqlite3");
    base
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
