pub mod pca_projector;
