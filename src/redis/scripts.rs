use redis::Script;

use crate::AlgorithmKind;

pub(crate) const FIXED_WINDOW_SCRIPT: &str = r#"
    redis.replicate_commands()

    local time_array = redis.call("TIME")
    local now_ms = tonumber(time_array[1]) * 1000 + math.floor(tonumber(time_array[2]) / 1000)

    local key = KEYS[1]

    local limit = tonumber(ARGV[1])
    local count = tonumber(ARGV[2])
    local interval_ms = tonumber(ARGV[3])

    redis.call("HSETNX", key, "window_start", now_ms)
    redis.call("HSETNX", key, "count", 0)

    local state = redis.call("HMGET", key, "window_start", "count")
    local window_start = tonumber(state[1])
    local current = tonumber(state[2]) or 0

    if now_ms - window_start >= interval_ms then
        window_start = now_ms
        current = 0
        redis.call("HSET", key, "window_start", window_start, "count", current)
    end

    if current + count <= limit then
        redis.call("HSET", key, "count", current + count)
        return 1
    end

    return 0
"#;

pub(crate) const SLIDING_WINDOW_SCRIPT: &str = r#"
    redis.replicate_commands()

    local time_array = redis.call("TIME")
    local now_ms = tonumber(time_array[1]) * 1000 + math.floor(tonumber(time_array[2]) / 1000)

    local key = KEYS[1]

    local slot_count = tonumber(ARGV[1])
    local interval_ms = tonumber(ARGV[2])
    local slot_width_ms = tonumber(ARGV[3])
    local limit = tonumber(ARGV[4])
    local count = tonumber(ARGV[5])

    if redis.call("HSETNX", key, "window_start", now_ms) == 1 then
        for i = 0, slot_count - 1 do
            redis.call("HSETNX", key, "t" .. i, 0)
            redis.call("HSETNX", key, "c" .. i, 0)
        end
    end

    local window_start = tonumber(redis.call("HGET", key, "window_start"))

    local elapsed_ms = now_ms - window_start
    if elapsed_ms < 0 then
        elapsed_ms = 0
    end

    local absolute_slot = math.floor(elapsed_ms / slot_width_ms)
    local index = absolute_slot % slot_count
    local slot_start_ms = window_start + absolute_slot * slot_width_ms

    local touched_field = "t" .. index
    local count_field = "c" .. index

    local slot = redis.call("HMGET", key, touched_field, count_field)
    local touched = tonumber(slot[1]) or 0
    local current = tonumber(slot[2]) or 0

    -- left over from an earlier cycle of the ring
    if touched < slot_start_ms then
        current = 0
    end
    if now_ms > touched then
        touched = now_ms
    end

    redis.call("HSET", key, touched_field, touched, count_field, current)

    local fields = {}
    for i = 0, slot_count - 1 do
        fields[#fields + 1] = "t" .. i
        fields[#fields + 1] = "c" .. i
    end

    local values = redis.call("HMGET", key, unpack(fields))
    local horizon_ms = now_ms - interval_ms
    local sum = 0

    for i = 1, #values, 2 do
        local slot_touched = tonumber(values[i])
        if slot_touched and slot_touched >= horizon_ms then
            sum = sum + (tonumber(values[i + 1]) or 0)
        end
    end

    if sum + count <= limit then
        redis.call("HSET", key, count_field, current + count)
        return 1
    end

    return 0
"#;

pub(crate) const LEAKY_BUCKET_SCRIPT: &str = r#"
    redis.replicate_commands()

    local now_s = tonumber(redis.call("TIME")[1])

    local key = KEYS[1]

    local capacity = tonumber(ARGV[1])
    local rate = tonumber(ARGV[2])
    local count = tonumber(ARGV[3])

    redis.call("HSETNX", key, "last_time", now_s)
    redis.call("HSETNX", key, "level", 0)

    local state = redis.call("HMGET", key, "last_time", "level")
    local last_time = tonumber(state[1])
    local level = tonumber(state[2]) or 0

    local elapsed_s = now_s - last_time
    if elapsed_s < 0 then
        elapsed_s = 0
    end

    level = level - elapsed_s * rate
    if level < 0 then
        level = 0
    end

    if now_s > last_time then
        last_time = now_s
    end

    local admitted = 0
    if level + count <= capacity then
        level = level + count
        admitted = 1
    end

    redis.call("HSET", key, "last_time", last_time, "level", level)

    return admitted
"#;

pub(crate) const TOKEN_BUCKET_SCRIPT: &str = r#"
    redis.replicate_commands()

    local now_s = tonumber(redis.call("TIME")[1])

    local key = KEYS[1]

    local capacity = tonumber(ARGV[1])
    local rate = tonumber(ARGV[2])
    local count = tonumber(ARGV[3])

    redis.call("HSETNX", key, "last_time", now_s)
    redis.call("HSETNX", key, "tokens", capacity)

    local state = redis.call("HMGET", key, "last_time", "tokens")
    local last_time = tonumber(state[1])
    local tokens = tonumber(state[2]) or 0

    local elapsed_s = now_s - last_time
    if elapsed_s < 0 then
        elapsed_s = 0
    end

    tokens = tokens + elapsed_s * rate
    if tokens > capacity then
        tokens = capacity
    end

    if now_s > last_time then
        last_time = now_s
    end

    local admitted = 0
    if tokens - count >= 0 then
        tokens = tokens - count
        admitted = 1
    end

    redis.call("HSET", key, "last_time", last_time, "tokens", tokens)

    return admitted
"#;

/// The four transition scripts, hashed once and invoked through `EVALSHA`.
pub(crate) struct Scripts {
    fixed_window: Script,
    sliding_window: Script,
    leaky_bucket: Script,
    token_bucket: Script,
}

impl Scripts {
    pub(crate) fn new() -> Self {
        Self {
            fixed_window: Script::new(FIXED_WINDOW_SCRIPT),
            sliding_window: Script::new(SLIDING_WINDOW_SCRIPT),
            leaky_bucket: Script::new(LEAKY_BUCKET_SCRIPT),
            token_bucket: Script::new(TOKEN_BUCKET_SCRIPT),
        }
    }

    pub(crate) fn get(&self, kind: AlgorithmKind) -> &Script {
        match kind {
            AlgorithmKind::FixedWindow => &self.fixed_window,
            AlgorithmKind::SlidingWindow => &self.sliding_window,
            AlgorithmKind::LeakyBucket => &self.leaky_bucket,
            AlgorithmKind::TokenBucket => &self.token_bucket,
        }
    }
}
