use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Serialize, Clone, Copy, strum::Display)]
pub enum ConnectivityState {
    Connected,
    Disconnected,
}

/// A change of state worth telling someone about
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ConnectivityEdge {
    Lost,
    Restored,
}

/// Tracks camera reachability. Starts optimistic and reports edges only, so a
/// camera that stays down produces a single alert.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Connectivity {
    state: ConnectivityState,
}

impl Default for Connectivity {
    fn default() -> Self {
        Self {
            state: ConnectivityState::Connected,
        }
    }
}

impl Connectivity {
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// Feed the outcome of one frame fetch
    pub fn observe(&mut self, frame_obtained: bool) -> Option<ConnectivityEdge> {
        let (next, edge) = match (self.state, frame_obtained) {
            (ConnectivityState::Connected, false) => {
                (ConnectivityState::Disconnected, Some(ConnectivityEdge::Lost))
            }
            (ConnectivityState::Disconnected, true) => {
                (ConnectivityState::Connected, Some(ConnectivityEdge::Restored))
            }
            (state, _) => (state, None),
        };
        self.state = next;
        edge
    }
}
