mod boundary;
mod convection;
mod ddt;
mod fvc;
mod grad;
mod interpolation;
mod matrix;
mod parallel;
mod schemes;
mod sn_grad;
