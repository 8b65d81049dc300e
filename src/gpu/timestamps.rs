//! GPU timestamp queries bracketing each frame.
//!
//! Every frame slot owns a two-entry query set, a resolve buffer and a
//! staging buffer. The frame encoder opens with an empty compute pass that
//! writes the first timestamp and closes with one that writes the second,
//! then resolves both into the staging buffer. The staging buffer is mapped
//! after submission and read in the map callback. A slot's buffers are only
//! touched again once the slot permit is released, which happens after the
//! read.

use web_time::Duration;

/// Bytes of two resolved `u64` timestamps.
const RESOLVED_BYTES: u64 = 16;

/// Elapsed time between two raw timestamps. `None` when the counter did not
/// advance, which some drivers report for frames they reordered.
#[must_use]
pub fn ticks_to_duration(begin: u64, end: u64, period_ns: f32) -> Option<Duration> {
    if end <= begin {
        return None;
    }
    let nanos = (end - begin) as f64 * f64::from(period_ns);
    Some(Duration::from_nanos(nanos.round() as u64))
}

struct SlotTimer {
    query_set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    staging: wgpu::Buffer,
}

/// Per-slot timestamp resources. Only built when the device has
/// `Features::TIMESTAMP_QUERY` and compute shaders.
pub struct GpuTimers {
    slots: Vec<SlotTimer>,
    period_ns: f32,
}

impl GpuTimers {
    /// Resources for `slots` frames in flight.
    #[must_use]
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, slots: usize) -> Self {
        let slots = (0..slots)
            .map(|i| SlotTimer {
                query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                    label: Some(&format!("Frame Timestamps {i}")),
                    ty: wgpu::QueryType::Timestamp,
                    count: 2,
                }),
                resolve: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Timestamp Resolve {i}")),
                    size: RESOLVED_BYTES,
                    usage: wgpu::BufferUsages::QUERY_RESOLVE
                        | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: false,
                }),
                staging: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Timestamp Staging {i}")),
                    size: RESOLVED_BYTES,
                    usage: wgpu::BufferUsages::MAP_READ
                        | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
            })
            .collect();
        let period_ns = queue.get_timestamp_period();
        log::debug!("timestamp period {period_ns:.3} ns");
        Self { slots, period_ns }
    }

    /// Write the frame's opening timestamp. Must be the first command of
    /// `encoder`.
    pub fn begin(&self, slot: usize, encoder: &mut wgpu::CommandEncoder) {
        let Some(timer) = self.slots.get(slot) else {
            return;
        };
        drop(encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Frame Begin Timestamp"),
            timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                query_set: &timer.query_set,
                beginning_of_pass_write_index: Some(0),
                end_of_pass_write_index: None,
            }),
        }));
    }

    /// Write the closing timestamp and copy both into the staging buffer.
    /// Must be the last command of `encoder`.
    pub fn end(&self, slot: usize, encoder: &mut wgpu::CommandEncoder) {
        let Some(timer) = self.slots.get(slot) else {
            return;
        };
        drop(encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Frame End Timestamp"),
            timestamp_writes: Some(wgpu::ComputePassTimestampWrites {
                query_set: &timer.query_set,
                beginning_of_pass_write_index: None,
                end_of_pass_write_index: Some(1),
            }),
        }));
        encoder.resolve_query_set(&timer.query_set, 0..2, &timer.resolve, 0);
        encoder.copy_buffer_to_buffer(
            &timer.resolve,
            0,
            &timer.staging,
            0,
            RESOLVED_BYTES,
        );
    }

    /// Map the staging buffer of `slot` after its frame was submitted and
    /// hand the measured GPU time to `on_read` once the device finishes.
    /// `on_read` also runs, with `None`, when the mapping fails.
    pub fn read(
        &self,
        slot: usize,
        on_read: impl FnOnce(Option<Duration>) + Send + 'static,
    ) {
        let Some(timer) = self.slots.get(slot) else {
            on_read(None);
            return;
        };
        let staging = timer.staging.clone();
        let period_ns = self.period_ns;
        timer
            .staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let gpu_time = match result {
                    Ok(()) => {
                        let [begin, end]: [u64; 2] = {
                            let mapped = staging.slice(..).get_mapped_range();
                            bytemuck::pod_read_unaligned(&mapped[..16])
                        };
                        staging.unmap();
                        ticks_to_duration(begin, end, period_ns)
                    }
                    Err(e) => {
                        log::warn!("timestamp readback failed: {e}");
                        None
                    }
                };
                on_read(gpu_time);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_scale_by_period() {
        assert_eq!(
            ticks_to_duration(1_000, 3_000, 1.0),
            Some(Duration::from_micros(2))
        );
        // 83.333 ns ticks, as reported by some mobile GPUs
        assert_eq!(
            ticks_to_duration(0, 12, 83.333),
            Some(Duration::from_nanos(1_000))
        );
    }

    #[test]
    fn stalled_counter_is_not_a_sample() {
        assert_eq!(ticks_to_duration(5, 5, 1.0), None);
        assert_eq!(ticks_to_duration(9, 3, 1.0), None);
    }
}
