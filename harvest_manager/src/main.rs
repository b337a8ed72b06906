//! Generates the candid file automatically

use harvest_manager::HarvestManager;

fn main() {
    let canister_e_idl = HarvestManager::idl();
    let idl = candid::pretty::candid::compile(&canister_e_idl.env.env, &Some(canister_e_idl.actor));

    println!("{}", idl);
}
