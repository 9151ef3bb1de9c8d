use std::{collections::HashMap, net::SocketAddr, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use broadcast_hub::message::{read_message, write_message};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
    process::{Child, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(5);
const BANNER: &str = " hub listening on ";

#[tokio::test]
async fn binary_relays_doorlock_events() -> Result<()> {
    let (mut child, mut stdout) = spawn_hubs()?;
    let addrs = read_banners(&mut stdout).await?;
    assert_eq!(addrs.len(), 3);

    let doorlock = addrs["doorlock"];
    let sensor = addrs["sensor"];
    assert_ne!(doorlock, sensor);

    let (lock_reader, mut lock_writer) = TcpStream::connect(doorlock).await?.into_split();
    let (app_reader, _app_writer) = TcpStream::connect(doorlock).await?.into_split();
    let mut lock_reader = BufReader::new(lock_reader);
    let mut app_reader = BufReader::new(app_reader);

    // Registration is asynchronous on the hub side; the accept log line for
    // the second client tells us both are in.
    wait_for_log(&mut stdout, "client connected", 2).await?;

    write_message(&mut lock_writer, "  DOOR_OPEN  ").await?;
    let relayed = timeout(READ_TIMEOUT, read_message(&mut app_reader))
        .await
        .context("timed out waiting for relayed event")??
        .context("hub closed the app connection")?;
    assert_eq!(relayed, "DOOR_OPEN");

    wait_for_log(&mut stdout, "DOOR_OPEN", 1).await?;
    let echoed = timeout(Duration::from_millis(200), read_message(&mut lock_reader)).await;
    assert!(echoed.is_err(), "sender must not get its own line back");

    stop(&mut child).await;
    Ok(())
}

fn spawn_hubs() -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_broadcast-hub"));
    cmd.args([
        "--bind",
        "127.0.0.1",
        "--command-port",
        "0",
        "--sensor-port",
        "0",
        "--doorlock-port",
        "0",
    ])
    .env("RUST_LOG", "info")
    .env("NO_COLOR", "1")
    .stdout(Stdio::piped())
    .stderr(Stdio::null())
    .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn broadcast-hub")?;
    let stdout = child
        .stdout
        .take()
        .context("stdout missing after spawn")?;
    Ok((child, BufReader::new(stdout)))
}

async fn read_banners(reader: &mut BufReader<ChildStdout>) -> Result<HashMap<String, SocketAddr>> {
    let mut addrs = HashMap::new();
    while addrs.len() < 3 {
        let line = read_line(reader).await?;
        let Some(at) = line.find(BANNER) else {
            continue;
        };
        let channel = line[..at]
            .split_whitespace()
            .last()
            .context("banner without channel name")?;
        let addr = line[at + BANNER.len()..]
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("banner without socket address: {line}"))?;
        addrs.insert(channel.to_string(), addr);
    }
    Ok(addrs)
}

async fn wait_for_log(
    reader: &mut BufReader<ChildStdout>,
    needle: &str,
    occurrences: usize,
) -> Result<()> {
    let mut found = 0;
    while found < occurrences {
        if read_line(reader).await?.contains(needle) {
            found += 1;
        }
    }
    Ok(())
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    let mut line = String::new();
    let bytes = timeout(READ_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| anyhow!("timed out waiting for hub output"))??;
    if bytes == 0 {
        return Err(anyhow!("hub process closed stdout"));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn stop(child: &mut Child) {
    let _ = child.kill().await;
    let _ = child.wait().await;
}
