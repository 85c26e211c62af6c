use crossbeam_channel::{unbounded, Sender};
use log::{debug, info};
use midir::{MidiInput, MidiInputConnection};
use crate::error::{Error, Result};
use crate::messaging::NoteEvent;
use super::ChannelSource;

const CLIENT_NAME: &str = "polytone MIDI input";

/// Handles MIDI input from connected devices
pub struct MidiInputHandler {
    connection: Option<MidiInputConnection<()>>,
    connected_port: Option<String>,
}

impl Default for MidiInputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiInputHandler {
    pub fn new() -> Self {
        Self {
            connection: None,
            connected_port: None,
        }
    }

    /// List the names of all available MIDI input ports
    pub fn list_ports(&self) -> Result<Vec<String>> {
        let midi_in = MidiInput::new(CLIENT_NAME)?;
        let mut port_names = Vec::new();
        for port in midi_in.ports() {
            port_names.push(midi_in.port_name(&port)?);
        }
        Ok(port_names)
    }

    /// Connect to a MIDI input port by name. Note messages from the port
    /// are delivered through the returned source.
    pub fn connect_to_port(&mut self, port_name: &str) -> Result<ChannelSource> {
        self.disconnect();

        let midi_in = MidiInput::new(CLIENT_NAME)?;
        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| midi_in.port_name(port).map(|name| name == port_name).unwrap_or(false))
            .ok_or_else(|| Error::MidiPort(format!("MIDI port '{}' not found", port_name)))?;

        let (tx, rx) = unbounded();
        let connection = midi_in.connect(
            &port,
            "polytone-read-input",
            move |_stamp, message, _| {
                Self::handle_midi_message(message, &tx);
            },
            (),
        )?;

        info!("Connected to MIDI port '{}'", port_name);
        self.connection = Some(connection);
        self.connected_port = Some(port_name.to_string());
        Ok(ChannelSource::new(rx))
    }

    /// Connect to the port at `index` in [`list_ports`](Self::list_ports) order.
    pub fn connect_to_index(&mut self, index: usize) -> Result<ChannelSource> {
        let ports = self.list_ports()?;
        let name = ports
            .get(index)
            .ok_or_else(|| Error::MidiPort(format!("MIDI port index {} out of range", index)))?
            .clone();
        self.connect_to_port(&name)
    }

    /// Close the port. Call only after the session reading from it stopped.
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            if let Some(name) = self.connected_port.take() {
                info!("Disconnected from MIDI port '{}'", name);
            }
        }
    }

    pub fn connected_port(&self) -> Option<&str> {
        self.connected_port.as_deref()
    }

    fn handle_midi_message(message: &[u8], sender: &Sender<NoteEvent>) {
        if let Some(event) = decode_message(message) {
            sender.send(event).ok();
        }
    }
}

impl Drop for MidiInputHandler {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Translate a raw MIDI message into a note event. Anything other than
/// note-on and note-off is ignored, as is the channel.
pub fn decode_message(message: &[u8]) -> Option<NoteEvent> {
    if message.len() < 3 {
        return None;
    }
    let pitch = message[1] & 0x7F;
    let velocity = message[2] & 0x7F;

    match message[0] & 0xF0 {
        0x80 => Some(NoteEvent::NoteOff { pitch }),
        // Note On with velocity 0 is equivalent to Note Off
        0x90 if velocity == 0 => Some(NoteEvent::NoteOff { pitch }),
        0x90 => Some(NoteEvent::NoteOn { pitch, velocity }),
        status => {
            debug!("Ignoring MIDI status 0x{:02X}", status);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_note_on_and_off() {
        assert_eq!(decode_message(&[0x90, 69, 127]), Some(NoteEvent::NoteOn { pitch: 69, velocity: 127 }));
        assert_eq!(decode_message(&[0x83, 60, 64]), Some(NoteEvent::NoteOff { pitch: 60 }));
    }

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        assert_eq!(decode_message(&[0x9F, 62, 0]), Some(NoteEvent::NoteOff { pitch: 62 }));
    }

    #[test]
    fn ignores_other_messages() {
        assert_eq!(decode_message(&[0xB0, 7, 100]), None);
        assert_eq!(decode_message(&[0xE0, 0, 64]), None);
        assert_eq!(decode_message(&[0x90, 60]), None);
        assert_eq!(decode_message(&[]), None);
    }
}
