pub(crate) mod bs_mod;
