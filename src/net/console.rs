use core::fmt::Write as _;

use embassy_net::Stack;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Timer};
use embedded_io_async::Write as _;
use heapless::{String, Vec};
use log::{info, warn};

use crate::command::status::get_status;
use crate::command::{COMMANDS, Command, REPLIES, reply_line};

pub const CONSOLE_PORT: u16 = 2323;

const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const LINE_LIMIT: usize = 128;
const REPLY_LIMIT: usize = 512;

/// Line-oriented command console, one session at a time. Commands are
/// queued to the service task and answered with its outcome; `status`
/// is answered directly from the published snapshot.
#[embassy_executor::task]
pub async fn console_task(stack: Stack<'static>) {
    let mut rx_buffer = [0; 1024];
    let mut tx_buffer = [0; 1024];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(IDLE_TIMEOUT));

        if let Err(e) = socket.accept(CONSOLE_PORT).await {
            warn!("console: accept failed: {:?}", e);
            Timer::after(Duration::from_secs(1)).await;
            continue;
        }

        info!("console: session open");
        serve(&mut socket).await;
        info!("console: session closed");

        socket.abort();
        socket.flush().await.ok();
    }
}

async fn serve(socket: &mut TcpSocket<'_>) {
    let mut line: Vec<u8, LINE_LIMIT> = Vec::new();
    let mut discard = false;
    let mut buf = [0u8; 64];

    loop {
        let got = match socket.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => n,
            // Idle timeout or connection reset
            Err(_) => return,
        };

        for &byte in &buf[..got] {
            match byte {
                b'\r' => {}
                b'\n' => {
                    let reply = if discard {
                        overlong_line()
                    } else {
                        respond(core::str::from_utf8(&line).unwrap_or("")).await
                    };
                    line.clear();
                    discard = false;
                    if socket.write_all(reply.as_bytes()).await.is_err() {
                        return;
                    }
                }
                _ => {
                    if !discard && line.push(byte).is_err() {
                        discard = true;
                    }
                }
            }
        }
    }
}

fn overlong_line() -> String<REPLY_LIMIT> {
    let mut reply = String::new();
    reply.push_str("error: line too long\n").ok();
    reply
}

async fn respond(line: &str) -> String<REPLY_LIMIT> {
    let mut reply: String<REPLY_LIMIT> = String::new();
    match Command::parse(line) {
        Ok(Command::Report) => {
            let status = get_status().await;
            writeln!(reply, "{}", status.summary_line()).ok();
            for (index, window) in status.intervals.iter().enumerate() {
                writeln!(reply, "{}: {}", index, window).ok();
            }
        }
        Ok(command) => {
            COMMANDS.send(command).await;
            let result = REPLIES.receive().await;
            writeln!(reply, "{}", reply_line(&result)).ok();
        }
        Err(err) => {
            writeln!(reply, "error: {}", err).ok();
        }
    }
    reply
}
