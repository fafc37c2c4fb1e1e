//! 帧计时器
//!
//! 测量两帧之间的墙钟时间，并每秒统计一次帧率。
//! 渲染器本身不读取时钟，经过的时间由主循环注入，测试因此可以使用固定步长。

use std::time::{Duration, Instant};

/// 帧计时器
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    frames_in_window: u32,
    window_start: Instant,
    fps: f32,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frames_in_window: 0,
            window_start: now,
            fps: 0.0,
        }
    }

    /// 返回距上次 `tick` 的秒数，同时更新帧率统计
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        self.record_frame(now);
        delta.as_secs_f32()
    }

    fn record_frame(&mut self, now: Instant) {
        self.frames_in_window += 1;
        let window = now - self.window_start;
        if window >= Duration::from_secs(1) {
            self.fps = self.frames_in_window as f32 / window.as_secs_f32();
            self.frames_in_window = 0;
            self.window_start = now;
        }
    }

    /// 最近一个统计窗口的帧率，第一秒内为 0
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// 计时器创建以来的总时间
    pub fn total_secs(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_is_non_negative() {
        let mut timer = FrameTimer::new();
        let first = timer.tick();
        let second = timer.tick();
        assert!(first >= 0.0);
        assert!(second >= 0.0);
        assert!(timer.total_secs() >= first);
    }

    #[test]
    fn test_fps_starts_at_zero() {
        let mut timer = FrameTimer::new();
        timer.tick();
        assert_eq!(timer.fps(), 0.0);
    }
}
