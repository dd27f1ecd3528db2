//! OSC (Open Sound Control) wire helpers for AbletonOSC communication.
//!
//! AbletonOSC speaks plain OSC 1.0 over UDP. This module wraps the `rosc`
//! codec with the few conversions the transport and the Live API need:
//! building messages, flattening received bundles and reading loosely typed
//! reply arguments.

use crate::error::Result;
use rosc::{decoder, encoder, OscMessage, OscPacket, OscType};

/// Largest datagram the receive loop accepts.
pub const MAX_DATAGRAM: usize = decoder::MTU;

/// Create an OSC message packet.
pub fn msg(path: &str, args: Vec<OscType>) -> OscPacket {
    OscPacket::Message(OscMessage {
        addr: path.into(),
        args,
    })
}

/// Encode a message ready for `send_to`.
pub fn encode_message(path: &str, args: Vec<OscType>) -> Result<Vec<u8>> {
    Ok(encoder::encode(&msg(path, args))?)
}

/// Decode a datagram into its messages, flattening nested bundles in order.
pub fn decode_messages(bytes: &[u8]) -> Result<Vec<OscMessage>> {
    let (_, packet) = decoder::decode_udp(bytes)?;
    let mut out = Vec::new();
    flatten(packet, &mut out);
    Ok(out)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(m) => out.push(m),
        OscPacket::Bundle(b) => {
            for p in b.content {
                flatten(p, out);
            }
        }
    }
}

/// Read a numeric argument as `f32`.
pub fn arg_f32(arg: &OscType) -> Option<f32> {
    match arg {
        OscType::Float(v) => Some(*v),
        OscType::Double(v) => Some(*v as f32),
        OscType::Int(v) => Some(*v as f32),
        OscType::Long(v) => Some(*v as f32),
        _ => None,
    }
}

/// Read an integral argument as `i32`. Floats are accepted when whole.
pub fn arg_i32(arg: &OscType) -> Option<i32> {
    match arg {
        OscType::Int(v) => Some(*v),
        OscType::Long(v) => i32::try_from(*v).ok(),
        OscType::Float(v) if v.fract() == 0.0 => Some(*v as i32),
        OscType::Double(v) if v.fract() == 0.0 => Some(*v as i32),
        _ => None,
    }
}

/// Read a boolean argument. AbletonOSC sends flags as ints.
pub fn arg_bool(arg: &OscType) -> Option<bool> {
    match arg {
        OscType::Bool(v) => Some(*v),
        OscType::Int(v) => Some(*v != 0),
        OscType::Long(v) => Some(*v != 0),
        OscType::Float(v) => Some(*v != 0.0),
        _ => None,
    }
}

pub fn arg_string(arg: &OscType) -> Option<String> {
    match arg {
        OscType::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Parse a command-line token into the most specific OSC type.
pub fn parse_arg(token: &str) -> OscType {
    if let Ok(v) = token.parse::<i32>() {
        OscType::Int(v)
    } else if let Ok(v) = token.parse::<f32>() {
        OscType::Float(v)
    } else {
        match token {
            "true" => OscType::Bool(true),
            "false" => OscType::Bool(false),
            _ => OscType::String(token.to_string()),
        }
    }
}

/// Render arguments for logs and CLI output.
pub fn format_args(args: &[OscType]) -> String {
    let parts: Vec<String> = args
        .iter()
        .map(|a| match a {
            OscType::Int(v) => v.to_string(),
            OscType::Long(v) => v.to_string(),
            OscType::Float(v) => v.to_string(),
            OscType::Double(v) => v.to_string(),
            OscType::String(s) => format!("{:?}", s),
            OscType::Bool(b) => b.to_string(),
            other => format!("{:?}", other),
        })
        .collect();
    format!("[{}]", parts.join(", "))
}
