use tokio::sync::mpsc;

/// Create a progress channel for one extraction run.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ProgressSender {
            tx: Some(tx),
            last: 0.0,
        },
        rx,
    )
}

pub type ProgressReceiver = mpsc::UnboundedReceiver<f32>;

/// Producer side of extraction progress.
///
/// Emitted values stay in [0, 1] and never decrease. Sending never blocks.
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<f32>>,
    last: f32,
}

impl ProgressSender {
    /// A sender nobody listens to
    pub fn disconnected() -> Self {
        Self { tx: None, last: 0.0 }
    }

    pub fn report(&mut self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            self.last
        } else {
            fraction.clamp(0.0, 1.0).max(self.last)
        };
        self.last = fraction;

        if let Some(tx) = &self.tx
            && tx.send(fraction).is_err()
        {
            self.tx = None;
        }
    }

    #[cfg(test)]
    fn last(&self) -> f32 {
        self.last
    }
}
