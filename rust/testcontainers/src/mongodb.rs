use testcontainers::core::{ContainerPort, Mount, WaitFor};
use testcontainers::Image;

const NAME: &str = "mongo";
// Client-level bulk writes need an 8.0 server.
const TAG: &str = "8.0";

/// Container port exposed by mongod.
pub const MONGODB_PORT: ContainerPort = ContainerPort::Tcp(27017);

#[derive(Debug, Clone)]
pub struct MongoDb {
    mounts: Vec<Mount>,
}

impl Default for MongoDb {
    fn default() -> Self {
        Self {
            mounts: vec![Mount::volume_mount("", "/data/db")],
        }
    }
}

impl Image for MongoDb {
    fn name(&self) -> &str {
        NAME
    }

    fn tag(&self) -> &str {
        TAG
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::message_on_stdout("Waiting for connections")]
    }

    fn mounts(&self) -> impl IntoIterator<Item = &Mount> {
        self.mounts.iter()
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &[MONGODB_PORT]
    }
}
