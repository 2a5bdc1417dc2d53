//! Conversions between [`Param`]/[`ParamType`] and the MAVLink
//! `PARAM_VALUE` / `PARAM_SET` wire representations.

use super::{Param, ParamType};
use mavlink::common::MavParamType;

/// MAVLink packs parameter names into a fixed 16-byte array with no
/// guaranteed NUL terminator when the name fills all 16 slots. rust-mavlink
/// generates this `char[16]` wire field as `[u8; 16]`, not `[char; 16]`.
pub(crate) fn name_from_param_id(param_id: [u8; 16]) -> String {
    param_id
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

pub(crate) fn param_id_from_name(name: &str) -> [u8; 16] {
    let mut id = [0u8; 16];
    for (slot, c) in id.iter_mut().zip(name.chars()) {
        *slot = c as u8;
    }
    id
}

pub(crate) fn param_type_from_mav(raw: MavParamType) -> ParamType {
    match raw {
        MavParamType::MAV_PARAM_TYPE_UINT8 => ParamType::Uint8,
        MavParamType::MAV_PARAM_TYPE_INT8 => ParamType::Int8,
        MavParamType::MAV_PARAM_TYPE_UINT16 => ParamType::Uint16,
        MavParamType::MAV_PARAM_TYPE_INT16 => ParamType::Int16,
        MavParamType::MAV_PARAM_TYPE_UINT32 => ParamType::Uint32,
        MavParamType::MAV_PARAM_TYPE_INT32 => ParamType::Int32,
        // UINT64/INT64/REAL64 have no ArduPilot parameter use; fold into
        // the nearest 32-bit representation rather than growing the enum
        // for values that never appear on the wire in practice.
        _ => ParamType::Real32,
    }
}

pub(crate) fn param_type_to_mav(param_type: ParamType) -> MavParamType {
    match param_type {
        ParamType::Uint8 => MavParamType::MAV_PARAM_TYPE_UINT8,
        ParamType::Int8 => MavParamType::MAV_PARAM_TYPE_INT8,
        ParamType::Uint16 => MavParamType::MAV_PARAM_TYPE_UINT16,
        ParamType::Int16 => MavParamType::MAV_PARAM_TYPE_INT16,
        ParamType::Uint32 => MavParamType::MAV_PARAM_TYPE_UINT32,
        ParamType::Int32 => MavParamType::MAV_PARAM_TYPE_INT32,
        ParamType::Real32 => MavParamType::MAV_PARAM_TYPE_REAL32,
    }
}

pub(crate) fn param_from_value_data(data: &mavlink::common::PARAM_VALUE_DATA) -> Param {
    Param {
        name: name_from_param_id(data.param_id).to_uppercase(),
        value: data.param_value,
        param_type: param_type_from_mav(data.param_type),
        index: data.param_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_short_name() {
        let id = param_id_from_name("ARMING_CHECK");
        assert_eq!(name_from_param_id(id), "ARMING_CHECK");
    }

    #[test]
    fn truncates_at_sixteen_chars() {
        let id = param_id_from_name("THIS_NAME_IS_WAY_TOO_LONG");
        assert_eq!(name_from_param_id(id).len(), 16);
    }

    #[test]
    fn full_width_name_has_no_terminator() {
        let name = "ABCDEFGHIJKLMNOP"; // exactly 16 chars
        let id = param_id_from_name(name);
        assert_eq!(name_from_param_id(id), name);
    }
}
