//! Serialisable copies of a recording.
//!
//! A [`Snapshot`] can be compared in assertions, stored as JSON, or written
//! as JSON lines for golden-file tests. The JSONL form is one line per value
//! followed by one line for the terminal event, if any:
//!
//! ```text
//! {"seq":0,"event":"output","data":1}
//! {"seq":1,"event":"output","data":2}
//! {"seq":2,"event":"failure","data":"boom"}
//! ```

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use streamrec_proto::Completion;

/// Owned copy of a recorder's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<O, E> {
    /// Label of the recorder that produced the snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Recorded values in emission order.
    pub outputs: Vec<O>,

    /// Terminal event, if the stream had finished.
    pub completion: Option<Completion<E>>,
}

/// One line of the JSONL export.
#[derive(Serialize)]
struct Line<'a, T> {
    seq: usize,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

impl<O, E> Snapshot<O, E> {
    /// Writes the snapshot as JSON lines.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> io::Result<()>
    where
        O: Serialize,
        E: Serialize,
    {
        for (seq, output) in self.outputs.iter().enumerate() {
            write_line(
                &mut writer,
                &Line {
                    seq,
                    event: "output",
                    data: Some(output),
                },
            )?;
        }

        if let Some(completion) = &self.completion {
            write_line(
                &mut writer,
                &Line {
                    seq: self.outputs.len(),
                    event: completion.kind(),
                    data: completion.failure(),
                },
            )?;
        }

        writer.flush()
    }

    /// Renders the JSONL export into a string.
    pub fn to_jsonl(&self) -> io::Result<String>
    where
        O: Serialize,
        E: Serialize,
    {
        let mut buffer = Vec::new();
        self.write_jsonl(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

fn write_line<W: Write, T: Serialize>(writer: &mut W, line: &Line<'_, T>) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, line)?;
    writeln!(writer)
}
