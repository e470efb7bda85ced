//! # Bus wire frames
//!
//! Requests and replies exchanged with the bus server as multipart messages. Every request is
//! answered by exactly one reply:
//!
//! | Request                 | Reply                                   |
//! |-------------------------|-----------------------------------------|
//! | `GET`, key              | `VAL`, payload or `NIL`                 |
//! | `SET`, key, payload     | `OK`                                    |
//! | `PUB`, key, payload     | `OK`                                    |
//!
//! Any request may be answered with `ERR`, message. Published messages are delivered on a
//! separate subscription socket as `key`, `payload`.

use super::BusError;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A request to the bus server.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Get(String),
    Set(String, Vec<u8>),
    Publish(String, Vec<u8>)
}

/// A reply from the bus server.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok,
    Value(Vec<u8>),
    Nil,
    Error(String)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Request {
    /// Convert the request into the frames to send.
    pub fn into_frames(self) -> Vec<Vec<u8>> {
        match self {
            Request::Get(key) => vec![b"GET".to_vec(), key.into_bytes()],
            Request::Set(key, payload) => vec![b"SET".to_vec(), key.into_bytes(), payload],
            Request::Publish(key, payload) => vec![b"PUB".to_vec(), key.into_bytes(), payload]
        }
    }

    /// Parse a request from received frames.
    pub fn from_frames(mut frames: Vec<Vec<u8>>) -> Result<Self, BusError> {
        if frames.len() < 2 {
            return Err(BusError::MalformedReply(format!(
                "expected at least 2 request frames, found {}", frames.len()
            )))
        }

        let payload = if frames.len() > 2 { frames.pop() } else { None };
        let key = String::from_utf8(frames.swap_remove(1))
            .map_err(|_| BusError::MalformedReply("key is not UTF-8".into()))?;

        match (frames[0].as_slice(), payload) {
            (b"GET", None) => Ok(Request::Get(key)),
            (b"SET", Some(p)) => Ok(Request::Set(key, p)),
            (b"PUB", Some(p)) => Ok(Request::Publish(key, p)),
            (verb, _) => Err(BusError::MalformedReply(format!(
                "unexpected request {:?}", String::from_utf8_lossy(verb)
            )))
        }
    }
}

impl Reply {
    /// Convert the reply into the frames to send.
    pub fn into_frames(self) -> Vec<Vec<u8>> {
        match self {
            Reply::Ok => vec![b"OK".to_vec()],
            Reply::Value(payload) => vec![b"VAL".to_vec(), payload],
            Reply::Nil => vec![b"NIL".to_vec()],
            Reply::Error(msg) => vec![b"ERR".to_vec(), msg.into_bytes()]
        }
    }

    /// Parse a reply from received frames.
    pub fn from_frames(mut frames: Vec<Vec<u8>>) -> Result<Self, BusError> {
        if frames.is_empty() || frames.len() > 2 {
            return Err(BusError::MalformedReply(format!(
                "expected 1 or 2 reply frames, found {}", frames.len()
            )))
        }

        let body = if frames.len() == 2 { frames.pop() } else { None };

        match (frames[0].as_slice(), body) {
            (b"OK", None) => Ok(Reply::Ok),
            (b"NIL", None) => Ok(Reply::Nil),
            (b"VAL", Some(p)) => Ok(Reply::Value(p)),
            (b"ERR", Some(m)) => Ok(Reply::Error(String::from_utf8_lossy(&m).into_owned())),
            (verb, _) => Err(BusError::MalformedReply(format!(
                "unexpected reply {:?}", String::from_utf8_lossy(verb)
            )))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_request_frames() {
        let frames = Request::Set("rover_pose".into(), b"{}".to_vec()).into_frames();
        assert_eq!(frames, vec![b"SET".to_vec(), b"rover_pose".to_vec(), b"{}".to_vec()]);

        assert_eq!(
            Request::from_frames(frames).unwrap(),
            Request::Set("rover_pose".into(), b"{}".to_vec())
        );
        assert_eq!(
            Request::from_frames(vec![b"GET".to_vec(), b"k".to_vec()]).unwrap(),
            Request::Get("k".into())
        );

        // GET never carries a payload, SET always does
        assert!(Request::from_frames(vec![b"GET".to_vec(), b"k".to_vec(), b"x".to_vec()]).is_err());
        assert!(Request::from_frames(vec![b"SET".to_vec(), b"k".to_vec()]).is_err());
        assert!(Request::from_frames(vec![b"DEL".to_vec(), b"k".to_vec()]).is_err());
    }

    #[test]
    fn test_reply_frames() {
        assert_eq!(Reply::from_frames(vec![b"OK".to_vec()]).unwrap(), Reply::Ok);
        assert_eq!(Reply::from_frames(vec![b"NIL".to_vec()]).unwrap(), Reply::Nil);
        assert_eq!(
            Reply::from_frames(vec![b"VAL".to_vec(), b"42".to_vec()]).unwrap(),
            Reply::Value(b"42".to_vec())
        );
        assert_eq!(
            Reply::from_frames(Reply::Error("no such key".into()).into_frames()).unwrap(),
            Reply::Error("no such key".into())
        );

        assert!(Reply::from_frames(vec![]).is_err());
        assert!(Reply::from_frames(vec![b"VAL".to_vec()]).is_err());
        assert!(Reply::from_frames(vec![b"OK".to_vec(), b"x".to_vec()]).is_err());
    }
}
