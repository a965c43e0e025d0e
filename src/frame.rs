use std::fmt;

/// One unit of data or acknowledgment handed to a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    sequence_number: u64,
    payload: Vec<u8>,
    is_ack: bool,
    checksum: Option<u32>,
}

impl Frame {
    /// Creates a frame without checksum.
    pub fn new(sequence_number: u64, payload: impl Into<Vec<u8>>, is_ack: bool) -> Self {
        Self {
            sequence_number,
            payload: payload.into(),
            is_ack,
            checksum: None,
        }
    }

    /// Data frame.
    pub fn data(sequence_number: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self::new(sequence_number, payload, false)
    }

    /// Acknowledgment frame with an empty payload.
    pub fn ack(sequence_number: u64) -> Self {
        Self::new(sequence_number, Vec::new(), true)
    }

    /// Sequence number within the stream.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// Payload bytes, possibly altered in transit.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether this is an acknowledgment.
    pub fn is_ack(&self) -> bool {
        self.is_ack
    }

    /// Checksum set by the protocol layer, if any.
    pub fn checksum(&self) -> Option<u32> {
        self.checksum
    }

    /// Replaces the payload.
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>) {
        self.payload = payload.into();
    }

    /// Sets the checksum. The channel never reads it.
    pub fn set_checksum(&mut self, checksum: u32) {
        self.checksum = Some(checksum);
    }

    /// Consumes the frame, returning its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub(crate) fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_ack { "ACK" } else { "DATA" };
        write!(
            f,
            "[{kind} #{}] {}",
            self.sequence_number,
            String::from_utf8_lossy(&self.payload)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn test_display_distinguishes_ack_and_data() {
        assert_eq!(Frame::data(7, "hello").to_string(), "[DATA #7] hello");
        assert_eq!(Frame::ack(3).to_string(), "[ACK #3] ");
    }

    #[test_log::test]
    fn test_checksum_defaults_to_none() {
        let mut frame = Frame::data(0, vec![1, 2, 3]);
        assert_eq!(frame.checksum(), None);

        frame.set_checksum(0xBEEF);
        assert_eq!(frame.checksum(), Some(0xBEEF));
        assert_eq!(frame.payload(), &[1, 2, 3]);
    }

    #[test_log::test]
    fn test_payload_mutation() {
        let mut frame = Frame::new(1, "ab", false);
        frame.set_payload("xyz");
        assert_eq!(frame.payload(), b"xyz");
        assert!(!frame.is_ack());
        assert_eq!(frame.into_payload(), b"xyz".to_vec());
    }
}
