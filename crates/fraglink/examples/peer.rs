//! Interactive peer: send messages and files to another running peer.
//!
//! Start one peer per terminal and point them at each other:
//! - cargo run -p fraglink --example peer
//!   (answer the prompts: local port, peer IP, peer port)
//!
//! The transport itself runs on a background polling thread; this binary is
//! only the operator surface: it reads menu choices from stdin and prints
//! events as they arrive.

use std::{
    io::{self, BufRead},
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    process, thread,
};

use fraglink::{Command, Endpoint, Event, TransferOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let stdin = io::stdin();
    let mut input = stdin.lock();

    let local_port = prompt_port(&mut input, "Enter the port number to listen on:")?;
    let peer_ip = prompt_ipv4(&mut input, "Enter the peer's IP address:")?;
    let peer_port = prompt_port(&mut input, "Enter the peer's port number:")?;

    let remote = SocketAddr::from((peer_ip, peer_port));
    let mut endpoint = Endpoint::bind((Ipv4Addr::UNSPECIFIED, local_port), remote)?;
    println!("Listening on port {}, peer {}", local_port, remote);

    let commands = endpoint.command_sender();
    let events = endpoint.event_receiver();

    thread::spawn(move || {
        endpoint.start_polling();
    });
    thread::spawn(move || {
        for event in events.iter() {
            print_event(event);
        }
    });

    loop {
        println!();
        println!("What do you want to send?");
        println!("1 - Send File");
        println!("2 - Send Message");
        println!("3 - Change Destination Folder");
        println!("4 - Disconnect");

        let choice = read_line(&mut input)?;
        match choice.trim() {
            "1" => {
                if let Some(command) = build_file_command(&mut input)? {
                    commands.send(command)?;
                }
            }
            "2" => {
                let command = build_message_command(&mut input)?;
                commands.send(command)?;
            }
            "3" => {
                println!("Enter your destination folder:");
                let folder = read_line(&mut input)?;
                commands.send(Command::SetDestination(PathBuf::from(folder.trim())))?;
            }
            "4" => {
                println!("Are you sure you want to disconnect? (yes/no)");
                if read_line(&mut input)?.trim().eq_ignore_ascii_case("yes") {
                    println!("Disconnecting.");
                    process::exit(0);
                }
            }
            _ => println!("Invalid option. Please select from 1-4."),
        }
    }
}

fn print_event(event: Event) {
    match event {
        Event::MessageReceived(data) => {
            println!("Received message ({} bytes):", data.len());
            println!("{}", String::from_utf8_lossy(&data));
        }
        Event::FileReceived { name, path } => {
            println!("Received file '{}' saved to {}", name, path.display());
        }
        Event::TransferComplete(stats) => {
            println!(
                "Transfer complete: {} bytes in {} fragments ({} ms, {:.2}% header overhead)",
                stats.payload_bytes,
                stats.fragments,
                stats.duration.as_millis(),
                stats.header_overhead * 100.0
            );
            if let Some(smallest) = stats.smallest_fragment {
                println!(
                    "Fragment size {} bytes, last/smallest fragment {} bytes",
                    stats.nominal_fragment_size, smallest
                );
            }
        }
        Event::HeartbeatMissed(failures) => {
            println!("Heartbeat unanswered ({} consecutive failures)", failures);
        }
        Event::ConnectionLost => {
            println!("Connection lost: the peer stopped answering heartbeats.");
        }
    }
}

fn read_line(input: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        // Stdin closed: treat it as a clean shutdown.
        process::exit(0);
    }
    Ok(line)
}

fn prompt_port(input: &mut impl BufRead, prompt: &str) -> io::Result<u16> {
    loop {
        println!("{}", prompt);
        match read_line(input)?.trim().parse::<u16>() {
            Ok(port) if port > 0 => return Ok(port),
            _ => println!("Invalid port number. Please enter a number between 1 and 65535:"),
        }
    }
}

fn prompt_ipv4(input: &mut impl BufRead, prompt: &str) -> io::Result<Ipv4Addr> {
    loop {
        println!("{}", prompt);
        match read_line(input)?.trim().parse::<Ipv4Addr>() {
            Ok(addr) => return Ok(addr),
            Err(_) => println!("Invalid IP address. Please enter a valid IPv4 address:"),
        }
    }
}

fn prompt_options(input: &mut impl BufRead) -> io::Result<TransferOptions> {
    println!("Do you want to send the first packet corrupted? (yes/no)");
    let corrupt_first_packet = read_line(input)?.trim().eq_ignore_ascii_case("yes");

    println!("Do you want to set a custom fragment size? (yes/no)");
    let fragment_size = if read_line(input)?.trim().eq_ignore_ascii_case("yes") {
        println!("Enter the number of bytes per fragment (max: 1458):");
        match read_line(input)?.trim().parse::<u16>() {
            Ok(size) if size > 0 => Some(size.min(1458)),
            _ => {
                println!("Invalid input. Using the default fragment size.");
                None
            }
        }
    } else {
        None
    };

    Ok(TransferOptions { fragment_size, corrupt_first_packet })
}

fn build_file_command(input: &mut impl BufRead) -> io::Result<Option<Command>> {
    let options = prompt_options(input)?;

    println!("Enter the path to the file:");
    let path = PathBuf::from(read_line(input)?.trim());
    let content = match std::fs::read(&path) {
        Ok(content) => content,
        Err(e) => {
            println!("Could not read '{}': {}", path.display(), e);
            return Ok(None);
        }
    };
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());

    println!("Sending '{}' ({} bytes)...", name, content.len());
    Ok(Some(Command::SendFile { name, content, options }))
}

fn build_message_command(input: &mut impl BufRead) -> io::Result<Command> {
    let options = prompt_options(input)?;

    println!("Enter your message:");
    let message = read_line(input)?;

    Ok(Command::SendMessage { data: message.trim_end().as_bytes().to_vec(), options })
}
