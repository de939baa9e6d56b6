//! MQTT 3.1.1 (v4) packet helpers.
//!
//! Packet structures and their byte encoding come from `rumqttc::mqttbytes::v4`.
//! This module adds frame delimiting, encode/decode wrappers and builders for
//! the packets a client sends.

use bytes::BytesMut;

use crate::error::{Error, Result};
use crate::types;

pub use rumqttc::mqttbytes::v4::*;

/// Maximum packet size (1MB default).
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Read a variable-length integer (remaining length encoding).
///
/// Returns `Ok(Some((value, bytes_consumed)))`, `Ok(None)` if more bytes are
/// needed, or an error if the encoding is longer than four bytes.
pub fn read_variable_int(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    let mut multiplier = 1usize;
    let mut value = 0usize;

    for (i, &byte) in buf.iter().enumerate() {
        if i >= 4 {
            return Err(Error::Protocol("malformed remaining length".to_string()));
        }

        value += (byte & 0x7F) as usize * multiplier;

        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }

        multiplier *= 128;
    }

    if buf.len() >= 4 {
        return Err(Error::Protocol("malformed remaining length".to_string()));
    }
    Ok(None)
}

/// Total length of the frame at the start of `buf`.
///
/// Returns `Ok(None)` while the fixed header is still incomplete.
pub fn frame_len(buf: &[u8], max_size: usize) -> Result<Option<usize>> {
    if buf.is_empty() {
        return Ok(None);
    }

    let Some((remaining, var_len)) = read_variable_int(&buf[1..])? else {
        return Ok(None);
    };

    let total = 1 + var_len + remaining;
    if total > max_size {
        return Err(Error::Protocol(format!(
            "frame of {} bytes exceeds maximum of {}",
            total, max_size
        )));
    }
    Ok(Some(total))
}

/// Encode a packet into one frame.
pub fn encode(packet: &Packet, max_size: usize) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(packet.size());
    packet.write(&mut buf, max_size)?;
    Ok(buf)
}

/// Decode one complete frame.
pub fn decode(frame: &[u8], max_size: usize) -> Result<Packet> {
    let mut buf = BytesMut::from(frame);
    match Packet::read(&mut buf, max_size) {
        Ok(packet) => Ok(packet),
        Err(rumqttc::mqttbytes::Error::InsufficientBytes(n)) => {
            Err(Error::Protocol(format!("truncated frame, {} bytes missing", n)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Short packet name for logs and errors.
pub fn packet_name(packet: &Packet) -> &'static str {
    match packet {
        Packet::Connect(_) => "Connect",
        Packet::ConnAck(_) => "ConnAck",
        Packet::Publish(_) => "Publish",
        Packet::PubAck(_) => "PubAck",
        Packet::PubRec(_) => "PubRec",
        Packet::PubRel(_) => "PubRel",
        Packet::PubComp(_) => "PubComp",
        Packet::Subscribe(_) => "Subscribe",
        Packet::SubAck(_) => "SubAck",
        Packet::Unsubscribe(_) => "Unsubscribe",
        Packet::UnsubAck(_) => "UnsubAck",
        Packet::PingReq => "PingReq",
        Packet::PingResp => "PingResp",
        Packet::Disconnect => "Disconnect",
    }
}

/// Create a CONNECT packet.
pub fn create_connect(client_id: &str, keep_alive: u16, clean_session: bool) -> Packet {
    let mut connect = Connect::new(client_id);
    connect.keep_alive = keep_alive;
    connect.clean_session = clean_session;
    Packet::Connect(connect)
}

/// Create a CONNACK packet.
pub fn create_connack(session_present: bool, code: ConnectReturnCode) -> Packet {
    Packet::ConnAck(ConnAck::new(code, session_present))
}

/// Create a PUBLISH packet. `pkid` is ignored for QoS 0.
pub fn create_publish(
    topic: &str,
    payload: &[u8],
    qos: types::QoS,
    retain: bool,
    pkid: u16,
) -> Packet {
    let mut publish = Publish::new(topic, qos.into(), payload.to_vec());
    publish.retain = retain;
    if qos != types::QoS::AtMostOnce {
        publish.pkid = pkid;
    }
    Packet::Publish(publish)
}

/// Create a SUBSCRIBE packet for a single filter.
pub fn create_subscribe(pkid: u16, filter: &str, qos: types::QoS) -> Packet {
    let mut subscribe = Subscribe::new_many(vec![SubscribeFilter::new(
        filter.to_string(),
        qos.into(),
    )]);
    subscribe.pkid = pkid;
    Packet::Subscribe(subscribe)
}

/// Create a SUBACK packet.
pub fn create_suback(pkid: u16, return_codes: Vec<SubscribeReasonCode>) -> Packet {
    Packet::SubAck(SubAck::new(pkid, return_codes))
}

/// Create an UNSUBSCRIBE packet for a single filter.
pub fn create_unsubscribe(pkid: u16, filter: &str) -> Packet {
    Packet::Unsubscribe(Unsubscribe {
        pkid,
        topics: vec![filter.to_string()],
    })
}

/// Create an UNSUBACK packet.
pub fn create_unsuback(pkid: u16) -> Packet {
    Packet::UnsubAck(UnsubAck::new(pkid))
}

/// Create a PUBACK packet.
pub fn create_puback(pkid: u16) -> Packet {
    Packet::PubAck(PubAck::new(pkid))
}

/// Create a PUBREC packet.
pub fn create_pubrec(pkid: u16) -> Packet {
    Packet::PubRec(PubRec::new(pkid))
}

/// Create a PUBREL packet.
pub fn create_pubrel(pkid: u16) -> Packet {
    Packet::PubRel(PubRel::new(pkid))
}

/// Create a PUBCOMP packet.
pub fn create_pubcomp(pkid: u16) -> Packet {
    Packet::PubComp(PubComp::new(pkid))
}

/// Create a PINGREQ packet.
pub fn create_pingreq() -> Packet {
    Packet::PingReq
}

/// Create a DISCONNECT packet.
pub fn create_disconnect() -> Packet {
    Packet::Disconnect
}

/// Convert a received PUBLISH into a [`types::Message`].
pub fn to_message(publish: &Publish) -> types::Message {
    types::Message {
        topic: publish.topic.to_string(),
        payload: publish.payload.clone(),
        qos: publish.qos.into(),
        retain: publish.retain,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QoS;

    #[test]
    fn test_variable_int() {
        assert_eq!(read_variable_int(&[0x00]).unwrap(), Some((0, 1)));
        assert_eq!(read_variable_int(&[0x7f]).unwrap(), Some((127, 1)));
        assert_eq!(read_variable_int(&[0x80, 0x01]).unwrap(), Some((128, 2)));
        assert_eq!(
            read_variable_int(&[0xff, 0xff, 0xff, 0x7f]).unwrap(),
            Some((268_435_455, 4))
        );
        assert_eq!(read_variable_int(&[0x80]).unwrap(), None);
        assert!(read_variable_int(&[0x80, 0x80, 0x80, 0x80, 0x01]).is_err());
    }

    #[test]
    fn test_frame_len() {
        let frame = encode(&create_publish("t", b"hello", QoS::AtMostOnce, false, 0), MAX_PACKET_SIZE)
            .unwrap();
        assert_eq!(frame_len(&frame, MAX_PACKET_SIZE).unwrap(), Some(frame.len()));
        assert_eq!(frame_len(&frame[..1], MAX_PACKET_SIZE).unwrap(), None);
        assert_eq!(frame_len(&[], MAX_PACKET_SIZE).unwrap(), None);
        assert!(frame_len(&frame, 4).is_err());
    }

    #[test]
    fn test_create_connect() {
        let packet = create_connect("client-1", 60, true);
        if let Packet::Connect(connect) = packet {
            assert_eq!(connect.client_id, "client-1");
            assert_eq!(connect.keep_alive, 60);
            assert!(connect.clean_session);
        } else {
            panic!("Expected Connect packet");
        }
    }

    #[test]
    fn test_publish_decodes_to_message() {
        let frame = encode(
            &create_publish("x/y", b"hello", QoS::AtLeastOnce, true, 7),
            MAX_PACKET_SIZE,
        )
        .unwrap();

        match decode(&frame, MAX_PACKET_SIZE).unwrap() {
            Packet::Publish(publish) => {
                assert_eq!(publish.pkid, 7);
                let msg = to_message(&publish);
                assert_eq!(msg.topic, "x/y");
                assert_eq!(msg.payload.as_ref(), b"hello");
                assert_eq!(msg.qos, QoS::AtLeastOnce);
                assert!(msg.retain);
            }
            other => panic!("Expected Publish packet, got {}", packet_name(&other)),
        }
    }

    #[test]
    fn test_qos0_publish_has_no_pkid() {
        if let Packet::Publish(publish) = create_publish("t", b"", QoS::AtMostOnce, false, 9) {
            assert_eq!(publish.pkid, 0);
        } else {
            panic!("Expected Publish packet");
        }
    }

    #[test]
    fn test_decode_truncated_frame() {
        let frame = encode(&create_subscribe(3, "x/#", QoS::AtMostOnce), MAX_PACKET_SIZE).unwrap();
        assert!(matches!(
            decode(&frame[..frame.len() - 1], MAX_PACKET_SIZE),
            Err(Error::Protocol(_))
        ));
    }
}
