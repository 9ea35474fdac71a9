pub mod eval;
pub mod fix_ckpt;
