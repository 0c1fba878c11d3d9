//! Device voice backends — implementations of the `DeviceVoiceApi` port.
//!
//! | Feature      | Backend                          |
//! |--------------|----------------------------------|
//! | (always)     | [`UnsupportedDevice`]            |
//! | `native-tts` | `native::NativeDevice` (OS TTS)  |

#[cfg(feature = "native-tts")]
pub mod native;

use std::sync::Arc;

use saywise_core::{
    DeviceVoice, DeviceVoiceApi, SpeechError, UtteranceListener, UtteranceRequest,
};
use tokio::sync::watch;

/// Device without any speech capability.
///
/// Every `speak` fails with [`SpeechError::UnsupportedRuntime`].
#[derive(Debug)]
pub struct UnsupportedDevice {
    voices: watch::Sender<Vec<DeviceVoice>>,
}

impl Default for UnsupportedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl UnsupportedDevice {
    pub fn new() -> Self {
        Self {
            voices: watch::Sender::new(Vec::new()),
        }
    }
}

impl DeviceVoiceApi for UnsupportedDevice {
    fn is_supported(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<DeviceVoice> {
        Vec::new()
    }

    fn voices_changed(&self) -> watch::Receiver<Vec<DeviceVoice>> {
        self.voices.subscribe()
    }

    fn speak(&self, _request: UtteranceRequest, _listener: UtteranceListener) -> Result<(), SpeechError> {
        Err(SpeechError::UnsupportedRuntime)
    }

    fn cancel(&self) {}
}

/// The best device backend compiled into this build.
///
/// Falls back to [`UnsupportedDevice`] when the native engine cannot start.
pub fn default_device() -> Arc<dyn DeviceVoiceApi> {
    #[cfg(feature = "native-tts")]
    {
        match native::NativeDevice::spawn() {
            Ok(device) => return Arc::new(device),
            Err(e) => tracing::warn!(error = %e, "Device speech engine unavailable"),
        }
    }

    tracing::debug!("Using unsupported device voice backend");
    Arc::new(UnsupportedDevice::new())
}
