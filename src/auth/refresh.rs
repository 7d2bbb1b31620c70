//! 令牌刷新状态机
//!
//! 纯同步的状态对象：记录是否正在刷新，以及等待刷新结果的请求队列。
//! 调用方负责真正发起刷新与重放，这里只决定"谁来刷新"和"队列里有谁"。

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// 一次授权失败被接纳后的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 由本次调用方发起刷新
    StartRefresh,
    /// 刷新已在进行，仅排队
    Queued,
}

/// 刷新结束后如何处理队列
#[derive(Debug)]
pub enum Settlement<T> {
    /// 按入队顺序逐个重放
    Replay(Vec<T>),
    /// 丢弃，不重放
    Abandon(Vec<T>),
}

impl<T> Settlement<T> {
    pub fn len(&self) -> usize {
        match self {
            Settlement::Replay(items) | Settlement::Abandon(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct RefreshQueue<T> {
    state: RefreshState,
    pending: VecDeque<T>,
    waves: u64,
}

impl<T> Default for RefreshQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RefreshQueue<T> {
    pub fn new() -> Self {
        Self {
            state: RefreshState::Idle,
            pending: VecDeque::new(),
            waves: 0,
        }
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    pub fn is_refreshing(&self) -> bool {
        self.state == RefreshState::Refreshing
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// 已开始的刷新轮次
    pub fn waves(&self) -> u64 {
        self.waves
    }

    /// 接纳一个因授权失败而挂起的请求
    pub fn admit(&mut self, item: T) -> Admission {
        self.pending.push_back(item);
        match self.state {
            RefreshState::Idle => {
                self.state = RefreshState::Refreshing;
                self.waves += 1;
                Admission::StartRefresh
            }
            RefreshState::Refreshing => Admission::Queued,
        }
    }

    /// 刷新结束：回到 Idle 并清空队列
    pub fn settle(&mut self, refreshed: bool) -> Settlement<T> {
        self.state = RefreshState::Idle;
        let items: Vec<T> = self.pending.drain(..).collect();
        if refreshed {
            Settlement::Replay(items)
        } else {
            Settlement::Abandon(items)
        }
    }
}
