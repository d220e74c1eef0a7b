//! Audio container detection.
//!
//! Browsers record webm, phones record m4a, the CLI gets whatever file the
//! user points it at. Transcription backends want a file name with the right
//! extension, so the container is sniffed from its magic bytes.

/// Recognised audio containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Webm,
    Ogg,
    Mp3,
    Flac,
    M4a,
    Unknown,
}

impl AudioFormat {
    /// Detect the container from the first bytes of the file
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioFormat::Wav
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            AudioFormat::Webm
        } else if bytes.starts_with(b"OggS") {
            AudioFormat::Ogg
        } else if bytes.starts_with(b"fLaC") {
            AudioFormat::Flac
        } else if bytes.starts_with(b"ID3")
            || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
        {
            AudioFormat::Mp3
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            AudioFormat::M4a
        } else {
            AudioFormat::Unknown
        }
    }

    /// File extension (wav for unknown input)
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav | AudioFormat::Unknown => "wav",
            AudioFormat::Webm => "webm",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::M4a => "m4a",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Wav | AudioFormat::Unknown => "audio/wav",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::M4a => "audio/mp4",
        }
    }

    /// Upload file name, e.g. `utterance.webm`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_known_containers() {
        assert_eq!(AudioFormat::sniff(b"RIFF\x24\x00\x00\x00WAVEfmt "), AudioFormat::Wav);
        assert_eq!(AudioFormat::sniff(&[0x1A, 0x45, 0xDF, 0xA3, 0x01]), AudioFormat::Webm);
        assert_eq!(AudioFormat::sniff(b"OggS\x00\x02"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::sniff(b"fLaC\x00"), AudioFormat::Flac);
        assert_eq!(AudioFormat::sniff(b"ID3\x04\x00"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::sniff(&[0xFF, 0xFB, 0x90, 0x00]), AudioFormat::Mp3);
        assert_eq!(AudioFormat::sniff(b"\x00\x00\x00\x20ftypM4A "), AudioFormat::M4a);
    }

    #[test]
    fn test_unknown_falls_back_to_wav() {
        let format = AudioFormat::sniff(b"hello");
        assert_eq!(format, AudioFormat::Unknown);
        assert_eq!(format.file_name("utterance"), "utterance.wav");
    }
}
