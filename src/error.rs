//! Error types for the synthesis engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Equal division must be between 1 and 64, got {0}")]
    InvalidDivision(u32),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio device write failed: {0}")]
    DeviceWrite(String),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("MIDI file error: {0}")]
    MidiFile(String),

    #[error("Unsupported MIDI timing format")]
    MidiUnsupportedTiming,

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("Recorder thread has stopped")]
    RecorderClosed,

    #[error("Synth is not running")]
    NotRunning,

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFile(e.to_string())
    }
}

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::MidiPort(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        Error::AudioDevice(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(e: cpal::BuildStreamError) -> Self {
        Error::AudioDevice(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(e: cpal::PlayStreamError) -> Self {
        Error::AudioDevice(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
