//! Contract interfaces
//!
//! Only the functions the keepers read or encode are declared. Single
//! returns decode to the bare type, multiple returns to `<fn>Return`.

use alloy_sol_types::sol;

// ============================================
// TOKENS AND ORACLES
// ============================================

sol! {
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }

    /// Chainlink-style feed, 8 decimals
    #[derive(Debug)]
    interface IAggregator {
        function latestAnswer() external view returns (int256);
    }

    /// Protocol oracle proxy, `peekSpot` returns units of asset per 1e18 USD
    #[derive(Debug)]
    interface IProxyOracle {
        function peekSpot(bytes data) external view returns (uint256);
        function oracleImplementation() external view returns (address);
        function magicGlp() external view returns (address);
        function trancheVault() external view returns (address);
    }

    #[derive(Debug)]
    interface IERC4626 {
        function totalSupply() external view returns (uint256);
        function convertToAssets(uint256 shares) external view returns (uint256);
        function asset() external view returns (address);
        function staking() external view returns (address);
    }
}

// ============================================
// HARVESTERS
// ============================================

sol! {
    #[derive(Debug)]
    interface IMagicGlpHarvester {
        function lastExecution() external view returns (uint256);
        function totalRewardsBalanceAfterClaiming() external view returns (uint256);
        function run(uint256 minGlp, uint256 rewardAmount) external;
    }

    #[derive(Debug)]
    interface IGlpLens {
        function getMintedGlpFromTokenIn(address tokenIn, uint256 amount)
            external
            view
            returns (uint256 glpAmount, uint256 feeBasisPoints);
    }

    #[derive(Debug)]
    interface IMagicApeHarvester {
        function claimable() external view returns (uint256);
        function run() external;
    }

    #[derive(Debug)]
    interface IMagicLevelHarvester {
        function lastExecution() external view returns (uint256);
        function run(address vault, uint256 minLp, address tokenIn, uint256 maxAmountIn, bytes swapData) external;
    }

    #[derive(Debug)]
    interface ILevelStakingLens {
        function pendingRewards(uint256 pid, address user) external view returns (uint256);
    }

    #[derive(Debug)]
    interface IMagicCurveLpHarvester {
        function poolNumCoins() external view returns (uint8);
        function poolTokenInIndex() external view returns (uint8);
        function rewardToken() external view returns (address);
        function totalRewardsBalanceAfterClaiming() external view returns (uint256);
        function run(uint256 minLp, address tokenIn, uint256 maxAmountIn, bytes swapData) external;
    }

    #[derive(Debug)]
    interface ICurveLens {
        function calc_token_amount(address pool, address lpToken, uint256[4] amounts, uint256 numCoins, bool deposit)
            external
            view
            returns (uint256);
    }

    #[derive(Debug)]
    interface IWrappedGlpHarvester {
        function lastExecution() external view returns (uint256);
        function rewardToken() external view returns (address);
        function outputToken() external view returns (address);
        function totalRewardsBalanceAfterClaiming() external view returns (uint256);
        function run(uint256 minOut, bytes data) external;
    }

    #[derive(Debug)]
    interface IGmHarvester {
        function callbackGasLimit() external view returns (uint256);
        function run(
            address rewardToken,
            address marketInputToken,
            uint256 minOut,
            uint256 executionFee,
            bytes swapData,
            uint256 maxBentoBoxAmountIncreaseInBips,
            uint256 maxBentoBoxChangeAmountInBips
        ) external payable;
    }

    #[derive(Debug)]
    interface IMultiRewardsStaking {
        function earned(address user, address rewardToken) external view returns (uint256);
        function rewards(address user, address rewardToken) external view returns (uint256);
    }
}

// ============================================
// STRATEGIES AND EXECUTORS
// ============================================

sol! {
    /// Bentobox strategy executor
    #[derive(Debug)]
    interface IStrategyExecutor {
        function lastExecution() external view returns (uint256);
        function run(address strategy, uint256 maxBentoBoxAmountIncreaseInBips, uint256 maxBentoBoxChangeAmountInBips, bytes[] calls) external;
    }

    #[derive(Debug)]
    interface IVelodromeExecutor {
        function run(
            address strategy,
            uint256 maxBentoBoxAmountIncreaseInBips,
            uint256 maxBentoBoxChangeAmountInBips,
            address[] callees,
            bytes[] datas,
            bool postRebalanceEnabled
        ) external;
    }

    #[derive(Debug)]
    interface IInterestStrategy {
        function swapAndwithdrawFees(uint256 amountOutMin, address outputToken, bytes data) external returns (uint256 amountOut);
        function swapRewards(uint256 amountOutMin, address rewardToken, bytes data) external returns (uint256 amountOut);
        function setInterest(uint256 interestBips) external;
        function withdrawFees() external returns (uint256);
        function strategyToken() external view returns (address);
        function pendingFeeEarned() external view returns (uint128);
        function bentoBox() external view returns (address);
        function getYearlyInterestBips() external view returns (uint256);
    }

    #[derive(Debug)]
    interface IInterestLens {
        function previewAccrue(address strategy) external view returns (uint128);
    }

    #[derive(Debug)]
    interface IBentoBox {
        function balanceOf(address token, address account) external view returns (uint256);
        function toAmount(address token, uint256 share, bool roundUp) external view returns (uint256);
        function strategyData(address token) external view returns (uint64 strategyStartDate, uint64 targetPercentage, uint128 balance);
        function totals(address token) external view returns (uint128 elastic, uint128 base);
    }

    #[derive(Debug)]
    interface ICauldron {
        function totalBorrow() external view returns (uint128 elastic, uint128 base);
    }

    #[derive(Debug)]
    interface IStargateStrategy {
        function swapToLP(uint256 amountOutMin) external returns (uint256);
        function safeHarvest(uint256 maxBalance, bool rebalance, uint256 maxChangeAmount, bool harvestRewards) external;
    }

    #[derive(Debug)]
    interface IStargateV2Strategy {
        function swapToLP(uint256 amountOutMin, bytes data) external returns (uint256);
    }

    #[derive(Debug)]
    interface ILiquityStrategy {
        function strategyToken() external view returns (address);
        function swapRewards(uint256 amountOutMin, address rewardToken, bytes data) external returns (uint256 amountOut);
    }

    #[derive(Debug)]
    interface IStabilityPool {
        function getDepositorETHGain(address depositor) external view returns (uint256);
        function getDepositorLQTYGain(address depositor) external view returns (uint256);
    }

    #[derive(Debug)]
    interface ISolidlyLens {
        function quoteSolidlyWrapperHarvestAmountOut(address wrapper, address router, uint256 fee) external view returns (uint256);
        function quoteSolidlyGaugeVolatileStrategySwapToLPAmount(address strategy, address pair, address router, uint256 fee)
            external
            view
            returns (uint256);
    }

    #[derive(Debug)]
    interface ISolidlyFactory {
        function volatileFee() external view returns (uint256);
    }

    #[derive(Debug)]
    interface ISolidlyWrapper {
        function harvest(uint256 minAmountOut) external returns (uint256);
    }

    #[derive(Debug)]
    interface ISolidlyStrategy {
        function strategyToken() external view returns (address);
        function swapToLP(uint256 amountOutMin, uint256 fee) external returns (uint256);
    }
}

// ============================================
// DISTRIBUTION, LOCKS, FEEDS
// ============================================

sol! {
    #[derive(Debug)]
    interface IMagicUsd0ppDistribution {
        function getOffChainDistributionData() external view returns (uint256 timestamp, bytes32 merkleRoot);
        function getOffChainTokensClaimed(address account) external view returns (uint256);
        function claimOffChainDistribution(address account, uint256 amount, bytes32[] proof) external;
    }

    #[derive(Debug)]
    interface IRewardDistributor {
        function ready(address staking) external view returns (bool);
        function distribute(address staking) external;
    }

    #[derive(Debug)]
    interface ILockingMultiRewards {
        function processExpiredLocks(address[] users, uint256[] lockIndexes) external;
    }

    #[derive(Debug)]
    interface IXF33dOracle {
        function getFeesForFeedUpdate(uint16 dstChainId, address oracle) external view returns (uint256);
        function sendUpdatedRate(uint16 dstChainId, address oracle) external payable;
    }

    #[derive(Debug)]
    interface ICauldronFeeWithdrawer {
        function withdraw() external returns (uint256 amount);
        function estimateBridgingFee(uint256 amount) external view returns (uint256 fee, uint256 gas);
        function bridge(uint256 amount, uint256 fee, uint256 gas) external;
    }

    #[derive(Debug)]
    interface ISpellStakingRewardDistributor {
        struct Distribution {
            address recipient;
            uint80 gas;
            uint16 lzChainId;
            uint128 fee;
            uint128 amount;
        }

        function estimateBridgingFee(uint256 amount, uint16 lzDstChainId, address recipient)
            external
            view
            returns (uint256 fee, uint256 gas);
        function distribute(Distribution[] distributions) external;
    }

    #[derive(Debug)]
    interface ISpellSwapper {
        function swapMimForSpell1Inch(address swapper, bytes data) external;
    }
}

// ============================================
// GMX V2
// ============================================

sol! {
    #[derive(Debug)]
    interface IGmDataStore {
        function getUint(bytes32 key) external view returns (uint256);
    }

    #[derive(Debug)]
    interface IGmReader {
        struct MarketProps {
            address marketToken;
            address indexToken;
            address longToken;
            address shortToken;
        }

        struct PriceProps {
            uint256 min;
            uint256 max;
        }

        struct MarketPrices {
            PriceProps indexTokenPrice;
            PriceProps longTokenPrice;
            PriceProps shortTokenPrice;
        }

        function getMarket(address dataStore, address key) external view returns (MarketProps);
        function getDepositAmountOut(
            address dataStore,
            MarketProps market,
            MarketPrices prices,
            uint256 longTokenAmount,
            uint256 shortTokenAmount,
            address uiFeeReceiver,
            uint8 swapPricingType,
            bool includeVirtualInventoryImpact
        ) external view returns (uint256);
    }
}

// ============================================
// LAYERZERO RELAY
// ============================================

sol! {
    #[derive(Debug)]
    interface ILzMulticallSenderReceiver {
        struct Call {
            address to;
            uint256 value;
            bytes data;
        }

        function lzEndpoint() external view returns (address);
        function send(uint16 dstChainId, Call[] calls) external payable;
    }

    #[derive(Debug)]
    interface ILzEndpoint {
        function estimateFees(uint16 dstChainId, address userApplication, bytes payload, bool payInZRO, bytes adapterParams)
            external
            view
            returns (uint256 nativeFee, uint256 zroFee);
    }
}
