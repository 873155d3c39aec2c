//! Demo client: synthesises a handful of S1AP PDUs (attach plus a handover
//! pair) and streams them to a running spoolerd, printing each ack.

use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::info;

use s1watch_engine::ingest::IngestClient;
use s1watch_engine::model::{Direction, PayloadType, SignalMessage, now_nanos};

#[derive(Parser)]
#[command(name = "demo_generator", about = "s1watch demo traffic generator")]
struct Cli {
    /// spoolerd address.
    #[arg(default_value = "localhost:50051")]
    server: String,

    /// Number of messages to send.
    #[arg(default_value_t = 10)]
    n: usize,
}

/// Assemble an S1AP PDU: choice header, procedure, criticality, open-type
/// wrapper, sequence preamble, 2-byte IE count, then IE fields.
fn build_pdu(pdu_index: u8, procedure: u8, ies: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (id, value) in ies {
        body.extend_from_slice(&id.to_be_bytes());
        body.push(0x40); // criticality: ignore
        body.push(value.len() as u8);
        body.extend_from_slice(value);
    }

    let mut pdu = Vec::new();
    pdu.push(pdu_index << 5);
    pdu.push(procedure);
    pdu.push(0x00);
    pdu.push(0x40);
    pdu.push(0x00);
    pdu.extend_from_slice(&(ies.len() as u16).to_be_bytes());
    pdu.extend_from_slice(&body);
    pdu
}

/// TBCD-encode an IMSI into a NAS mobile identity value.
fn tbcd_imsi(imsi: &str) -> Vec<u8> {
    let digits: Vec<u8> = imsi.bytes().map(|b| b - b'0').collect();
    let odd = digits.len() % 2 == 1;
    let mut bytes = Vec::new();
    bytes.push((digits[0] << 4) | if odd { 0x08 } else { 0x00 } | 0x01);
    for pair in digits[1..].chunks(2) {
        let low = pair[0];
        let high = if pair.len() == 2 { pair[1] } else { 0x0F };
        bytes.push((high << 4) | low);
    }
    bytes
}

/// A NAS-PDU IE value: octet-string length byte plus a plain Attach
/// Request carrying the IMSI.
fn nas_attach_request(imsi: &str) -> Vec<u8> {
    let identity = tbcd_imsi(imsi);
    let mut nas = vec![0x07, 0x41, 0x71];
    nas.push(identity.len() as u8);
    nas.extend_from_slice(&identity);

    let mut value = vec![nas.len() as u8];
    value.extend_from_slice(&nas);
    value
}

/// The demo conversation: attach, then a handover pair, per simulated UE.
fn sample_pdus() -> Vec<Vec<u8>> {
    let imsi = "123456789012345";
    let source_cell = vec![0x13, 0x00, 0x14, 0x0a, 0x0b, 0x0c, 0x0d];
    let target_cell = vec![0x13, 0x00, 0x14, 0x0e, 0x0f, 0x10, 0x11];

    vec![
        // initialUEMessage with the UE's IMSI inside the NAS attach.
        build_pdu(
            0,
            12,
            &[
                (8, vec![0x00, 0x00, 0xc8]),
                (26, nas_attach_request(imsi)),
                (100, source_cell.clone()),
            ],
        ),
        // HandoverRequired from the serving cell.
        build_pdu(
            0,
            0,
            &[
                (0, vec![0x00, 0x6f]),
                (8, vec![0x00, 0x00, 0xc8]),
                (100, source_cell),
            ],
        ),
        // HandoverNotify at the target cell.
        build_pdu(
            0,
            2,
            &[
                (0, vec![0x00, 0x6f]),
                (8, vec![0x00, 0x00, 0xc8]),
                (100, target_cell),
            ],
        ),
    ]
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("demo_generator: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    info!("connecting to {} to send {} message(s)", cli.server, cli.n);
    let mut client = IngestClient::connect(&cli.server).context("connecting to spoolerd")?;

    let pdus = sample_pdus();
    let base_ts = now_nanos();

    for i in 0..cli.n {
        let message = SignalMessage {
            ts_capture: base_ts + i as i64 * 1_000_000, // 1 ms apart
            ts_ingest: 0,                               // server stamps
            source_id: "demo_source".to_string(),
            direction: Direction::Uplink,
            source_sequence: i as i64,
            transport_meta: r#"{"demo": true}"#.to_string(),
            payload_type: PayloadType::RawBytes,
            raw_bytes: pdus[i % pdus.len()].clone(),
        };

        let ack = client.send(&message).context("sending message")?;
        match (ack.success, ack.spool_offset) {
            (true, Some(offset)) => println!(
                "message {i} acked: p={} offset={}",
                offset.partition, offset.offset
            ),
            (true, None) => println!("message {i} acked"),
            (false, _) => eprintln!("message {i} failed: {}", ack.error_message),
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    println!("demo complete: sent {} message(s)", cli.n);
    Ok(())
}
