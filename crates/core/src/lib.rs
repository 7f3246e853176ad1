pub mod shared {
    pub mod bounding_box;
    pub mod cluster_id;
    pub mod config;
    pub mod constants;
    pub mod error;
    pub mod face_observation;
    pub mod frame;
    pub mod model_resolver;
    pub mod vector_math;
}

pub mod imaging {
    pub mod domain {
        pub mod image_library;
        pub mod image_reader;
        pub mod image_writer;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod embedding_provider;
        pub mod observation_extractor;
    }
    pub mod infrastructure;
}

pub mod clustering {
    pub mod domain {
        pub mod clusterer;
    }
    pub mod infrastructure;
}

pub mod identity {
    pub mod domain {
        pub mod identity_registry;
        pub mod identity_summary;
    }
}

pub mod metrics {
    pub mod domain {
        pub mod metrics_snapshot;
        pub mod quality_scores;
    }
}

pub mod projection {
    pub mod domain {
        pub mod projector;
        pub mod scatter_point;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod face_corpus;
    pub mod pipeline_logger;
    pub mod process_images_use_case;
}

#[cfg(test)]
mod test_support;
