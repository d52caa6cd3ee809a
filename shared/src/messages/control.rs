use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

/// Clock sample, client to server
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ping {
    /// Client clock in seconds when the ping was sent
    pub client_time: f64,
}

impl Serde for Ping {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.client_time.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            client_time: f64::de(reader)?,
        })
    }
}

/// Reply to a [`Ping`], echoing its client time unchanged
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pong {
    pub client_time: f64,
    /// Server clock in seconds when the reply was written
    pub server_time: f64,
}

impl Serde for Pong {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.client_time.ser(writer);
        self.server_time.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            client_time: f64::de(reader)?,
            server_time: f64::de(reader)?,
        })
    }
}

/// Server instructs every client to load a new shared scene
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SceneChange {
    pub scene: String,
}

impl Serde for SceneChange {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.scene.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            scene: String::de(reader)?,
        })
    }
}
