use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{spawn, JoinHandle};
use std::time::SystemTime;

use tracing::{error, info};

use crate::hci::packet::PacketType;

const BTSNOOP_MAGIC: &[u8] = b"btsnoop\0";
const BTSNOOP_VERSION: u32 = 1;
// UART (H4) datalink
const BTSNOOP_FORMAT_H4: u32 = 1002;
// btsnoop timestamps count microseconds from year 0, not the unix epoch
const BTSNOOP_EPOCH_DELTA_US: i64 = 0x00E0_3AB4_4A67_6000;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Direction {
    Sent,
    Received,
}

/// Optional packet capture, enabled by pointing the `BTSNOOP_LOG`
/// environment variable at a file. Records are written from a dedicated
/// thread so the event loop never blocks on disk.
pub(crate) struct LogWriter {
    sender: Option<Sender<(SystemTime, Direction, PacketType, Vec<u8>)>>,
    _thread: Option<JoinHandle<()>>,
}

impl LogWriter {
    pub fn new() -> Self {
        match std::env::var_os("BTSNOOP_LOG").map(PathBuf::from) {
            Some(path) => {
                let (sender, receiver) = std::sync::mpsc::channel();
                let thread = spawn(move || {
                    Self::writer_thread(path, receiver)
                        .unwrap_or_else(|err| error!("Failed to write btsnoop log: {:?}", err));
                });
                Self {
                    sender: Some(sender),
                    _thread: Some(thread),
                }
            }
            None => Self {
                sender: None,
                _thread: None,
            },
        }
    }

    /// `payload` is the HCI packet without the H4 tag; the tag is
    /// reconstructed from `kind`.
    pub fn write(&self, direction: Direction, kind: PacketType, payload: &[u8]) {
        if let Some(sender) = &self.sender {
            let mut record = Vec::with_capacity(1 + payload.len());
            record.push(u8::from(kind));
            record.extend_from_slice(payload);
            let _ = sender.send((SystemTime::now(), direction, kind, record));
        }
    }

    fn writer_thread(
        path: PathBuf,
        receiver: Receiver<(SystemTime, Direction, PacketType, Vec<u8>)>,
    ) -> std::io::Result<()> {
        let mut file = BufWriter::new(File::create(&path)?);
        info!("Writing btsnoop log to {:?}", path);
        file.write_all(BTSNOOP_MAGIC)?;
        file.write_all(&BTSNOOP_VERSION.to_be_bytes())?;
        file.write_all(&BTSNOOP_FORMAT_H4.to_be_bytes())?;
        file.flush()?;

        while let Ok((timestamp, direction, kind, data)) = receiver.recv() {
            let timestamp = timestamp
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_micros() as i64)
                .unwrap_or_default()
                + BTSNOOP_EPOCH_DELTA_US;
            let flags = match direction {
                Direction::Sent => 0,
                Direction::Received => 1,
            } | match kind {
                PacketType::Command | PacketType::Event => 2,
                PacketType::AclData => 0,
            };
            let size = data.len() as u32;
            file.write_all(&size.to_be_bytes())?;
            file.write_all(&size.to_be_bytes())?;
            file.write_all(&(flags as u32).to_be_bytes())?;
            file.write_all(&0u32.to_be_bytes())?;
            file.write_all(&timestamp.to_be_bytes())?;
            file.write_all(&data)?;
            file.flush()?;
        }
        Ok(())
    }
}
