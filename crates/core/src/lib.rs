//! Throttled facial-emotion sampling over a live video source.
//!
//! - `emotion`: the detection capability, its lifecycle and result normalization
//! - `media`: capture devices and the controller that owns them
//! - `sampling`: the polling loop, its scheduler and the published state
//! - `shared`: frames, clocks, constants and model resolution

pub mod emotion {
    pub mod domain {
        pub mod detection_result;
        pub mod emotion_analyzer;
        pub mod emotion_category;
        pub mod emotion_state;
        pub mod result_normalizer;
    }
    pub mod infrastructure;
}

pub mod media {
    pub mod domain {
        pub mod media_device;
    }
    pub mod infrastructure;
    pub mod media_source_controller;
}

pub mod sampling {
    pub mod domain {
        pub mod frame_scheduler;
        pub mod sampler_config;
        pub mod throttle_gate;
        pub mod video_frame_source;
    }
    pub mod emotion_feed;
    pub mod emotion_sampling_loop;
    pub mod infrastructure;
    pub mod sampling_logger;
}

pub mod shared {
    pub mod clock;
    pub mod constants;
    pub mod frame;
    pub mod model_resolver;
    pub mod stream_info;
}

#[cfg(test)]
mod testing;
