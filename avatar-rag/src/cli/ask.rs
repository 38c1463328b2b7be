use std::io::Write;

use futures::StreamExt;

use avatar_rag::config::Config;
use avatar_rag::domain::AnswerEvent;
use avatar_rag::error::{AvatarError, Result};

pub async fn run(config: Config, question: String, stream: bool, json: bool) -> Result<()> {
    let service = super::build_service(&config).await?;

    if !stream {
        let answer = service.ask(&question).await?;
        if json {
            println!("{}", serde_json::json!({ "response": answer }));
        } else {
            println!("{answer}");
        }
        return Ok(());
    }

    let mut events = service.ask_stream(&question)?;
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        if json {
            print!("{}", event.to_sse_frame());
            stdout.flush()?;
            continue;
        }

        match event {
            AnswerEvent::Chunk {
                chunk, complete, ..
            } => {
                print!("{chunk}");
                stdout.flush()?;
                if complete {
                    println!();
                }
            }
            AnswerEvent::Error { error } => {
                return Err(AvatarError::Generation(error));
            }
        }
    }

    Ok(())
}
