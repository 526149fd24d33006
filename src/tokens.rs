// Rough token count for the cost hint next to the generate button. Never used to cap requests.

use crate::prompt::AdvisoryRequest;

pub fn estimate(text: &str) -> usize {
    let chars = text.chars().count();
    if chars == 0 {
        return 0;
    }
    chars.div_ceil(4).max(1)
}

pub fn estimate_request(request: &AdvisoryRequest) -> usize {
    estimate(&request.system_instruction) + estimate(&request.user_instruction)
}
