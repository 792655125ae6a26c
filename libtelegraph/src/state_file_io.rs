use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::GraphState;
use crate::async_util::perform_async_work;
use crate::message::Message;
use crate::signals::SignalSpec;
use crate::util::get_multi_extension;
use crate::view_mode::ViewMode;

pub const STATE_FILE_EXTENSION: &str = "tgraph.ron";

/// The part of a graph that survives a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub signals: Vec<SignalSpec>,
    pub view_mode: ViewMode,
    #[serde(default)]
    pub paused: bool,
}

pub fn read_state_file(path: &Utf8Path) -> Result<UserState> {
    if get_multi_extension(path).as_deref() != Some(STATE_FILE_EXTENSION) {
        warn!("{path} does not have the .{STATE_FILE_EXTENSION} extension");
    }
    let bytes = std::fs::read(path.as_std_path())
        .with_context(|| format!("Failed to read state file '{path}'"))?;
    let state: UserState =
        ron::de::from_bytes(&bytes).with_context(|| format!("Failed loading {path}"))?;
    if let Err(e) = state.view_mode.validate() {
        bail!("{path} contains an invalid view mode: {e}");
    }
    Ok(state)
}

pub fn encode_state(state: &UserState) -> Result<String> {
    let opt = ron::Options::default();
    opt.to_string_pretty(state, ron::ser::PrettyConfig::default())
        .context("Failed to encode state")
}

impl GraphState {
    #[must_use]
    pub fn user_state(&self) -> UserState {
        UserState {
            signals: self.registry.specs(),
            view_mode: self.view.mode(),
            paused: self.paused,
        }
    }

    pub fn load_state_file(&mut self, path: Utf8PathBuf) {
        let msg = match read_state_file(&path) {
            Ok(state) => Message::LoadState(state),
            Err(e) => {
                error!("Failed to load state: {e:#}");
                Message::Error(e)
            }
        };
        self.channels.sender.send(msg);
    }

    pub fn save_state_file(&mut self, path: Utf8PathBuf) {
        let encoded = match encode_state(&self.user_state()) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!("Failed to encode state. {e:#}");
                return;
            }
        };
        let sender = self.channels.sender.clone();
        perform_async_work(async move {
            match tokio::fs::write(path.as_std_path(), encoded.as_bytes()).await {
                Ok(()) => {
                    info!("Saved state to {path}");
                    sender.send(Message::StateSaved(path));
                }
                Err(e) => {
                    error!("Failed to write state to {path}: {e}");
                    sender.send(Message::Error(
                        eyre::Report::new(e).wrap_err(format!("Failed to write state to {path}")),
                    ));
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> UserState {
        UserState {
            signals: vec![SignalSpec {
                id: "BMS.soc".into(),
                display_name: "State of charge".to_string(),
                color: "#a7e47e".to_string(),
            }],
            view_mode: ViewMode::Zoom {
                start: 30.0,
                end: 90.0,
            },
            paused: true,
        }
    }

    #[test]
    fn state_file_survives_a_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("run.tgraph.ron")).unwrap();
        std::fs::write(&path, encode_state(&sample_state()).unwrap()).unwrap();
        assert_eq!(read_state_file(&path).unwrap(), sample_state());
    }

    #[test]
    fn hand_written_state_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("hand.tgraph.ron")).unwrap();
        std::fs::write(
            &path,
            r##"(
                signals: [(id: "MC.rpm", display_name: "Motor speed", color: "#81a2be")],
                view_mode: LiveScroll(window_seconds: 10.0),
            )"##,
        )
        .unwrap();
        let state = read_state_file(&path).unwrap();
        assert_eq!(state.view_mode, ViewMode::LiveScroll { window_seconds: 10.0 });
        assert!(!state.paused);
    }

    #[test]
    fn invalid_mode_in_state_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("bad.tgraph.ron")).unwrap();
        std::fs::write(
            &path,
            "(signals: [], view_mode: Zoom(start: 90.0, end: 30.0), paused: false)",
        )
        .unwrap();
        assert!(read_state_file(&path).is_err());
    }

    #[test]
    fn missing_state_file_is_an_error() {
        assert!(read_state_file(Utf8Path::new("/nonexistent/x.tgraph.ron")).is_err());
    }
}
