//! `--list` and `--transcript-full`.

use wigli_core::conversation::Conversation;
use wigli_store::ChatArchive;

pub fn list(archive: &ChatArchive) -> Result<(), Box<dyn std::error::Error>> {
    let lines = archive.history()?;
    if lines.is_empty() {
        println!("No saved conversations yet");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub fn print_transcript(conversation: Option<&Conversation>) {
    match conversation {
        Some(conversation) => println!("{}", conversation.format_transcript(None, None, "")),
        None => println!("No chat for which to print transcript"),
    }
}
