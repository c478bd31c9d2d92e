//! The seam between calibration procedures and the experiment control system.
//!
//! Procedures never reach for a global client. They are handed a
//! [`SequencerSession`] which is opened before the procedure and closed after it.
//! [`OfflineSession`] keeps the whole ODB in memory and is used for dry runs.
use fxhash::FxHashMap;
use serde_json::{Map, Value};

use super::error::SessionError;

const PARAM_PATH: &str = "/Sequencer/Param/Value";
const RUN_STATE_PATH: &str = "/Runinfo/State";
const RUN_NUMBER_PATH: &str = "/Runinfo/Run number";
const STATE_STOPPED: u64 = 1;
const STATE_RUNNING: u64 = 3;

/// The operations a sequencer script may use on the experiment
pub trait SequencerSession {
    /// Declare a script parameter. Its default is used unless a value is already set.
    fn register_param(
        &mut self,
        name: &str,
        description: &str,
        default: Value,
    ) -> Result<(), SessionError>;
    fn get_param(&self, name: &str) -> Result<Option<Value>, SessionError>;
    fn odb_get(&self, path: &str) -> Result<Option<Value>, SessionError>;
    fn odb_set(&mut self, path: &str, value: Value) -> Result<(), SessionError>;
    fn start_run(&mut self) -> Result<(), SessionError>;
    fn stop_run(&mut self) -> Result<(), SessionError>;
    /// Free text message into the experiment log
    fn msg(&mut self, text: &str) -> Result<(), SessionError>;
    /// Let the experiment take data for a number of seconds
    fn wait(&mut self, seconds: u32) -> Result<(), SessionError>;
    fn close(&mut self) -> Result<(), SessionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredParam {
    pub name: String,
    pub description: String,
    pub default: Value,
}

/// A SequencerSession with no experiment behind it.
///
/// ODB keys are stored flat by full path. Reading a path that is not a key but a prefix
/// of keys returns an object built from everything below it, like reading an ODB directory.
#[derive(Debug, Clone, Default)]
pub struct OfflineSession {
    name: String,
    odb: FxHashMap<String, Value>,
    params: Vec<RegisteredParam>,
    messages: Vec<String>,
    journal: Vec<(String, Value)>,
    waited_seconds: u64,
    closed: bool,
}

fn check_path(path: &str) -> Result<(), SessionError> {
    if !path.starts_with('/') || path.ends_with('/') || path.contains("//") {
        return Err(SessionError::BadPath(path.to_string()));
    }
    Ok(())
}

fn insert_nested(object: &mut Map<String, Value>, relative: &str, value: &Value) {
    match relative.split_once('/') {
        Some((head, rest)) => {
            let entry = object
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_nested(child, rest, value);
            }
        }
        None => {
            object.insert(relative.to_string(), value.clone());
        }
    }
}

impl OfflineSession {
    pub fn new(name: &str) -> Self {
        let mut session = Self {
            name: name.to_string(),
            ..Default::default()
        };
        session
            .odb
            .insert(RUN_STATE_PATH.to_string(), Value::from(STATE_STOPPED));
        session
            .odb
            .insert(RUN_NUMBER_PATH.to_string(), Value::from(0u64));
        log::info!("Opened offline session {}", session.name);
        session
    }

    fn check_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.odb.get(RUN_STATE_PATH) == Some(&Value::from(STATE_RUNNING))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn run_number(&self) -> u64 {
        self.odb
            .get(RUN_NUMBER_PATH)
            .and_then(Value::as_u64)
            .unwrap_or_default()
    }

    pub fn params(&self) -> &[RegisteredParam] {
        &self.params
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Every odb_set in the order it happened
    pub fn journal(&self) -> &[(String, Value)] {
        &self.journal
    }

    pub fn waited_seconds(&self) -> u64 {
        self.waited_seconds
    }
}

impl SequencerSession for OfflineSession {
    fn register_param(
        &mut self,
        name: &str,
        description: &str,
        default: Value,
    ) -> Result<(), SessionError> {
        self.check_open()?;
        self.odb
            .entry(format!("{PARAM_PATH}/{name}"))
            .or_insert_with(|| default.clone());
        self.params.retain(|p| p.name != name);
        self.params.push(RegisteredParam {
            name: name.to_string(),
            description: description.to_string(),
            default,
        });
        Ok(())
    }

    fn get_param(&self, name: &str) -> Result<Option<Value>, SessionError> {
        self.odb_get(&format!("{PARAM_PATH}/{name}"))
    }

    fn odb_get(&self, path: &str) -> Result<Option<Value>, SessionError> {
        self.check_open()?;
        check_path(path)?;
        if let Some(value) = self.odb.get(path) {
            return Ok(Some(value.clone()));
        }

        let prefix = format!("{path}/");
        let mut directory = Map::new();
        for (key, value) in self.odb.iter() {
            if let Some(relative) = key.strip_prefix(&prefix) {
                insert_nested(&mut directory, relative, value);
            }
        }
        if directory.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Value::Object(directory)))
        }
    }

    fn odb_set(&mut self, path: &str, value: Value) -> Result<(), SessionError> {
        self.check_open()?;
        check_path(path)?;
        self.journal.push((path.to_string(), value.clone()));
        self.odb.insert(path.to_string(), value);
        Ok(())
    }

    fn start_run(&mut self) -> Result<(), SessionError> {
        self.check_open()?;
        if self.is_running() {
            return Err(SessionError::Rpc(String::from("Run is already in progress")));
        }
        let run_number = self.run_number() + 1;
        self.odb
            .insert(RUN_NUMBER_PATH.to_string(), Value::from(run_number));
        self.odb
            .insert(RUN_STATE_PATH.to_string(), Value::from(STATE_RUNNING));
        log::info!("Started run {run_number}");
        Ok(())
    }

    fn stop_run(&mut self) -> Result<(), SessionError> {
        self.check_open()?;
        if self.is_running() {
            log::info!("Stopped run {}", self.run_number());
        }
        self.odb
            .insert(RUN_STATE_PATH.to_string(), Value::from(STATE_STOPPED));
        Ok(())
    }

    fn msg(&mut self, text: &str) -> Result<(), SessionError> {
        self.check_open()?;
        log::info!("[{}] {}", self.name, text);
        self.messages.push(text.to_string());
        Ok(())
    }

    fn wait(&mut self, seconds: u32) -> Result<(), SessionError> {
        self.check_open()?;
        self.waited_seconds += seconds as u64;
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.check_open()?;
        self.closed = true;
        log::info!("Closed offline session {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params() {
        let mut session = OfflineSession::new("test");
        session
            .odb_set("/Sequencer/Param/Value/run_time", json!(7))
            .unwrap();
        session
            .register_param("run_time", "Run time in seconds", json!(3))
            .unwrap();
        session
            .register_param("max_hits", "Maximum hits for tuning", json!(3))
            .unwrap();
        assert_eq!(session.get_param("run_time").unwrap(), Some(json!(7)));
        assert_eq!(session.get_param("max_hits").unwrap(), Some(json!(3)));
        assert_eq!(session.get_param("nope").unwrap(), None);
        assert_eq!(session.params().len(), 2);
    }

    #[test]
    fn test_odb_directory() {
        let mut session = OfflineSession::new("test");
        session.odb_set("/Equipment/A/x", json!(1)).unwrap();
        session.odb_set("/Equipment/A/B/y", json!(true)).unwrap();
        session.odb_set("/Equipment/AB/z", json!(2)).unwrap();
        assert_eq!(
            session.odb_get("/Equipment/A").unwrap(),
            Some(json!({"x": 1, "B": {"y": true}}))
        );
        assert_eq!(session.odb_get("/Equipment/A/x").unwrap(), Some(json!(1)));
        assert_eq!(session.odb_get("/Equipment/C").unwrap(), None);
        assert!(matches!(
            session.odb_get("Equipment/A"),
            Err(SessionError::BadPath(_))
        ));
        assert_eq!(session.journal().len(), 3);
    }

    #[test]
    fn test_run_control() {
        let mut session = OfflineSession::new("test");
        assert!(!session.is_running());
        session.start_run().unwrap();
        assert!(session.is_running());
        assert_eq!(session.run_number(), 1);
        assert!(matches!(session.start_run(), Err(SessionError::Rpc(_))));
        session.stop_run().unwrap();
        session.stop_run().unwrap();
        assert!(!session.is_running());
        session.start_run().unwrap();
        assert_eq!(session.run_number(), 2);
    }

    #[test]
    fn test_close() {
        let mut session = OfflineSession::new("test");
        session.msg("hello").unwrap();
        session.wait(3).unwrap();
        session.close().unwrap();
        assert!(session.is_closed());
        assert!(matches!(session.msg("again"), Err(SessionError::Closed)));
        assert!(matches!(session.close(), Err(SessionError::Closed)));
        assert_eq!(session.messages(), &[String::from("hello")]);
        assert_eq!(session.waited_seconds(), 3);
    }
}
