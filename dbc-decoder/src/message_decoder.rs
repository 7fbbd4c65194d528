//! Message Decoding Engine
//!
//! Decides which signals of a message are present in a frame and decodes them.
//! A multiplexed signal is present only when its switch signal carries the
//! signal's `mN` value, or a value inside its extended multiplexing ranges.

use crate::codec;
use crate::config::DecoderConfig;
use crate::model::network::{Message, Network, Signal};
use crate::types::{CodecError, DecodedMessage, DecodedSignal, PhysicalValue, RawValue};

/// Where the active multiplexor value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MuxContext {
    /// Decode the switch signal from the same frame first
    #[default]
    FromFrame,
    /// The caller already knows the value of the governing switch
    Active(u64),
    /// No multiplexor value established; multiplexed signals are not present
    Unknown,
}

/// Message decoder - extracts signals from CAN frames
pub struct MessageDecoder;

impl MessageDecoder {
    /// Check that a signal is present in this frame instance
    pub fn check_present(
        message: &Message,
        signal: &Signal,
        data: &[u8],
        context: MuxContext,
    ) -> Result<(), CodecError> {
        Self::check_present_at(message, signal, data, context, 0)
    }

    fn check_present_at(
        message: &Message,
        signal: &Signal,
        data: &[u8],
        context: MuxContext,
        depth: usize,
    ) -> Result<(), CodecError> {
        let Some(own_value) = signal.multiplexer.switch_value() else {
            return Ok(());
        };
        let not_present = |active| CodecError::MultiplexorNotPresent {
            signal: signal.name.clone(),
            active,
        };

        let switch = message.switch_of(signal).ok_or_else(|| not_present(None))?;
        let active = match context {
            MuxContext::Active(value) => value,
            MuxContext::Unknown => return Err(not_present(None)),
            MuxContext::FromFrame => {
                // Switch chains are bounded by the number of signals
                if depth >= message.signals.len() {
                    return Err(not_present(None));
                }
                Self::check_present_at(message, switch, data, context, depth + 1).map_err(
                    |err| match err {
                        CodecError::MultiplexorNotPresent { .. } => not_present(None),
                        other => other,
                    },
                )?;
                match Self::switch_value(switch, data) {
                    Ok(value) => value,
                    // A negative switch selects no multiplexed signal
                    Err(err @ CodecError::UnsupportedValueRepresentation { .. }) => {
                        log::debug!("Signal '{}' not present: {}", signal.name, err);
                        return Err(not_present(None));
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        let present = match &signal.extended_multiplex {
            Some(ext) => ext.contains(active),
            None => active == own_value,
        };
        if present {
            Ok(())
        } else {
            log::trace!(
                "Signal '{}' not present for switch '{}' = {}",
                signal.name,
                switch.name,
                active
            );
            Err(not_present(Some(active)))
        }
    }

    /// Raw value of a switch signal as an unsigned integer
    pub fn switch_value(switch: &Signal, data: &[u8]) -> Result<u64, CodecError> {
        match codec::extract_raw(switch, data)? {
            RawValue::Unsigned(value) => Ok(value),
            RawValue::Signed(value) if value >= 0 => Ok(value as u64),
            other => Err(CodecError::UnsupportedValueRepresentation {
                signal: switch.name.clone(),
                reason: format!("multiplexor value {} is not a non-negative integer", other),
            }),
        }
    }

    /// Decode a single signal, honoring multiplexing
    pub fn decode_signal(
        message: &Message,
        signal: &Signal,
        data: &[u8],
        context: MuxContext,
        config: &DecoderConfig,
    ) -> Result<DecodedSignal, CodecError> {
        Self::check_present(message, signal, data, context)?;

        let raw_value = codec::extract_raw(signal, data)?;
        let value = codec::to_physical(signal, raw_value);

        // Look up value description from VAL_ entries
        let value_description = if config.value_descriptions {
            raw_value
                .as_i64()
                .and_then(|raw| signal.value_descriptions.get(raw))
                .map(str::to_string)
        } else {
            None
        };

        Ok(DecodedSignal {
            name: signal.name.clone(),
            value,
            raw_value,
            unit: signal.unit().map(str::to_string),
            value_description,
            within_range: signal.within_range(value),
        })
    }

    /// Decode every signal present in a frame
    ///
    /// Signals that do not fit a short frame are skipped with a warning;
    /// signals switched off by the multiplexor are skipped silently.
    /// Messages excluded by the configured filter decode to no signals.
    pub fn decode_message(
        message: &Message,
        data: &[u8],
        config: &DecoderConfig,
    ) -> Result<DecodedMessage, CodecError> {
        let mut decoded = DecodedMessage {
            message_id: message.id,
            name: message.name.clone(),
            sender: message.sender().map(str::to_string),
            signals: Vec::new(),
            multiplexer_value: None,
        };
        if !config.should_process_message(message.id) {
            log::trace!("Message 0x{:X} excluded by the message filter", message.id);
            return Ok(decoded);
        }

        decoded.multiplexer_value = message
            .multiplexor()
            .and_then(|mux| Self::switch_value(mux, data).ok());

        decoded.signals.reserve(message.signals.len());
        for signal in &message.signals {
            match Self::decode_signal(message, signal, data, MuxContext::FromFrame, config) {
                Ok(signal) => {
                    if config.drop_out_of_range && !signal.within_range {
                        log::debug!(
                            "Dropping out-of-range signal '{}' = {}",
                            signal.name,
                            signal.value
                        );
                        continue;
                    }
                    decoded.signals.push(signal);
                }
                Err(CodecError::MultiplexorNotPresent { .. }) => continue,
                Err(err @ CodecError::BitRangeOutOfBounds { .. }) => {
                    log::warn!("Skipping signal in message '{}': {}", message.name, err);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(decoded)
    }
}

impl Network {
    fn codec_target(
        &self,
        message_id: u32,
        signal_name: &str,
    ) -> Result<(&Message, &Signal), CodecError> {
        let message = self
            .message(message_id)
            .ok_or(CodecError::UnknownMessage(message_id))?;
        let signal = message
            .signal(signal_name)
            .ok_or_else(|| CodecError::UnknownSignal {
                message_id,
                signal: signal_name.to_string(),
            })?;
        Ok((message, signal))
    }

    /// Decode the physical value of one signal from a frame payload
    pub fn decode_signal(
        &self,
        message_id: u32,
        signal_name: &str,
        frame: &[u8],
        mux: MuxContext,
    ) -> Result<PhysicalValue, CodecError> {
        let (message, signal) = self.codec_target(message_id, signal_name)?;
        MessageDecoder::check_present(message, signal, frame, mux)?;
        codec::decode(signal, frame)
    }

    /// Encode one signal into a copy of `frame`
    ///
    /// Bits outside the signal keep their values from `frame`.
    pub fn encode_signal(
        &self,
        message_id: u32,
        signal_name: &str,
        value: PhysicalValue,
        frame: &[u8],
        mux: MuxContext,
    ) -> Result<Vec<u8>, CodecError> {
        let (message, signal) = self.codec_target(message_id, signal_name)?;
        MessageDecoder::check_present(message, signal, frame, mux)?;
        let mut data = frame.to_vec();
        codec::encode(signal, value, &mut data)?;
        Ok(data)
    }

    /// Build a zero-filled payload of the message size and encode the values
    ///
    /// Every listed signal must be present in the finished payload, so
    /// multiplexed signals need their switch value in the same list.
    pub fn encode_message(
        &self,
        message_id: u32,
        values: &[(&str, PhysicalValue)],
    ) -> Result<Vec<u8>, CodecError> {
        let message = self
            .message(message_id)
            .ok_or(CodecError::UnknownMessage(message_id))?;
        let mut data = vec![0u8; message.size as usize];

        let mut signals = Vec::with_capacity(values.len());
        for &(name, value) in values {
            let (_, signal) = self.codec_target(message_id, name)?;
            codec::encode(signal, value, &mut data)?;
            signals.push(signal);
        }
        for signal in signals {
            MessageDecoder::check_present(message, signal, &data, MuxContext::FromFrame)?;
        }
        Ok(data)
    }

    /// Decode every signal present in a frame of the given message
    pub fn decode_message(
        &self,
        message_id: u32,
        frame: &[u8],
        config: &DecoderConfig,
    ) -> Result<DecodedMessage, CodecError> {
        let message = self
            .message(message_id)
            .ok_or(CodecError::UnknownMessage(message_id))?;
        MessageDecoder::decode_message(message, frame, config)
    }
}
