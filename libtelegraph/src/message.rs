use camino::Utf8PathBuf;
use derive_more::Debug;

use crate::remote::{ChannelKey, QueryError, RangeData, RequestId};
use crate::signals::SignalId;
use crate::state_file_io::UserState;
use crate::view_mode::ViewMode;

#[derive(Debug)]
pub enum Message {
    /// Start displaying a signal. Ignored if it is already displayed.
    AddSignal {
        id: SignalId,
        display_name: String,
        color: String,
    },
    RemoveSignal(SignalId),
    /// Switch view mode. Invalid payloads are rejected without any change.
    SetViewMode(ViewMode),
    /// Fired by the poll scheduler.
    PollTick,
    /// Fired by the scroll timer while in LiveScroll mode. Moves the axis
    /// without fetching.
    ScrollTick,
    /// Outcome of a range request, in whatever order the network delivers them.
    RangeResponse {
        channel: ChannelKey,
        request_id: RequestId,
        #[debug(skip)]
        result: Result<RangeData, QueryError>,
    },
    /// The user panned or zoomed the time axis.
    UserRangeChanged { start: f64, end: f64 },
    /// Debounce timer for the user range change of this generation elapsed.
    UserRangeSettled(u64),
    /// Resume polling, or arm it if there are no signals yet.
    StartPolling,
    /// Pause polling.
    StopPolling,
    SaveStateFile(Utf8PathBuf),
    LoadStateFile(Utf8PathBuf),
    LoadState(UserState),
    /// A state file was written.
    StateSaved(Utf8PathBuf),
    Error(eyre::Report),
}
