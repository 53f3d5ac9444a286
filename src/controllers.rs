use serde::{Deserialize, Serialize};

use crate::dyn_case::{ExciterData, GovernorData, PssData};
use crate::error::{Error, Result};

/// Static exciter attached to a synchronous machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExciterStatic {
    pub name: String,
    pub ta: f64,
    pub tb: f64,
    pub te: f64,
    pub ka: f64,
    pub max_efd: f64,
    pub min_efd: f64,
    pub kbc: f64,
}

impl ExciterStatic {
    pub fn from_data(data: &ExciterData) -> Self {
        Self {
            name: format!("Exciter_Bus{}", data.bus),
            ta: data.ta,
            tb: data.tb,
            te: data.te,
            ka: data.ka,
            max_efd: data.u_max,
            min_efd: data.u_min,
            // the anti-windup gain is not taken from the data
            kbc: 0.0,
        }
    }
}

/// PSS1A power system stabilizer driven by rotor speed only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pss1a {
    pub name: String,
    pub kp: f64,
    pub kv: f64,
    pub kw: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub t4: f64,
    pub vs_max: f64,
    pub vs_min: f64,
    pub tw: f64,
}

impl Pss1a {
    pub fn from_data(data: &PssData) -> Self {
        Self {
            name: format!("PSS_Bus{}", data.bus),
            kp: 0.0,
            kv: 0.0,
            kw: data.ks,
            t1: data.t1,
            t2: data.t2,
            t3: data.t3,
            t4: data.t4,
            vs_max: data.u_smax,
            vs_min: data.u_smin,
            tw: data.tw,
        }
    }
}

/// Steam turbine governor. The droop R is the inverse of the data gain K.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamTurbineGovernor {
    pub name: String,
    pub om_ref: f64,
    pub r: f64,
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub d_pmax: f64,
    pub d_pmin: f64,
    pub pmax: f64,
    pub pmin: f64,
}

impl SteamTurbineGovernor {
    pub fn from_data(data: &GovernorData) -> Result<Self> {
        if data.k == 0.0 {
            return Err(Error::ZeroGovernorGain(data.bus));
        }
        Ok(Self {
            name: format!("TG_Bus{}", data.bus),
            om_ref: 1.0,
            r: 1.0 / data.k,
            t1: 0.0,
            t2: data.t1,
            t3: data.t3,
            d_pmax: data.p_up,
            d_pmin: data.p_down,
            pmax: data.p_max,
            pmin: data.p_min,
        })
    }
}
