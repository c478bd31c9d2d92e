/// Progress message sent from a running noise scan to whoever is watching it
#[derive(Debug, Clone, Default)]
pub struct ScanStatus {
    pub progress: f32,
    pub threshold: u32,
    pub iteration: u32,
}

impl ScanStatus {
    pub fn new(progress: f32, threshold: u32, iteration: u32) -> Self {
        Self {
            progress,
            threshold,
            iteration,
        }
    }
}
