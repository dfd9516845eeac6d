use std::fmt;

/// The role a peer plays in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Coordinator,
    Worker,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Client => "client",
            Role::Coordinator => "coordinator",
            Role::Worker => "worker",
        };

        write!(f, "{s}")
    }
}

/// Per connection protocol state.
///
/// Lives as long as the command loop serving the connection, a closed
/// session ends that loop after the current command.
#[derive(Debug, Clone)]
pub struct Session {
    peer: Role,
    active: bool,
    model: Option<String>,
}

impl Session {
    /// Creates a new active `Session`.
    ///
    /// # Arguments
    /// * `peer` - The role of the node on the other end.
    pub fn new(peer: Role) -> Self {
        Self {
            peer,
            active: true,
            model: None,
        }
    }

    pub fn peer(&self) -> Role {
        self.peer
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The model most recently registered through this connection.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn bind(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    /// Marks the session inactive and forgets its model.
    ///
    /// # Returns
    /// The model that was bound, if any.
    pub fn close(&mut self) -> Option<String> {
        self.active = false;
        self.model.take()
    }
}
