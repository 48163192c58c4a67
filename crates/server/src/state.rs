use std::sync::Arc;

use hashctl_control::Controller;

pub struct AppState {
    pub controller: Arc<Controller>,
}
