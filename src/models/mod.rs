pub mod shrinkage;
